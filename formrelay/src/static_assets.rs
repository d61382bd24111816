use rust_embed::RustEmbed;

/// HTML pages compiled into the binary.
#[derive(RustEmbed)]
#[folder = "static/"]
pub struct Assets;
