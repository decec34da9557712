use rust_embed::RustEmbed;

/// Prebuilt web UI bundle, embedded into the server binary so the
/// desktop shell only has to launch one process.
#[derive(RustEmbed)]
#[folder = "dist/"]
pub struct Assets;
