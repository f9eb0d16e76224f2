use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;

use crate::engine::RasterOptions;

pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Image processing HTTP server.
#[derive(Debug, Clone, Parser)]
#[command(name = "imgwire", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "IMGWIRE_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Path prefix the image routes are mounted under, e.g. `/api/images`.
    #[arg(long, env = "IMGWIRE_MOUNT", default_value = "/", value_parser = parse_mount)]
    pub mount: String,

    /// Directory searched for fonts. Repeatable; defaults to the system font
    /// directories.
    #[arg(long = "font-dir", env = "IMGWIRE_FONT_DIRS", value_delimiter = ',')]
    pub font_dirs: Vec<PathBuf>,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "IMGWIRE_BODY_LIMIT", default_value_t = DEFAULT_BODY_LIMIT)]
    pub body_limit: usize,

    /// Largest accepted image width or height in pixels.
    #[arg(long, env = "IMGWIRE_MAX_DIMENSION", default_value_t = 16384)]
    pub max_dimension: u32,
}

impl Config {
    pub fn engine_options(&self) -> RasterOptions {
        RasterOptions {
            font_dirs: self.font_dirs.clone(),
            max_dimension: self.max_dimension,
        }
    }
}

fn parse_mount(value: &str) -> Result<String, String> {
    if !value.starts_with('/') {
        return Err(format!("mount path must start with '/', got '{value}'"));
    }
    let trimmed = value.trim_end_matches('/');
    Ok(if trimmed.is_empty() { "/" } else { trimmed }.to_owned())
}
