//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `happyplaces_core` linkage.
//! - Optionally summarize an existing data directory.
//!
//! Usage: `happyplaces_cli [data_dir]`

use happyplaces_core::{AppConfig, AppContext, AppResult};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("happyplaces_core ping={}", happyplaces_core::ping());
    println!("happyplaces_core version={}", happyplaces_core::core_version());

    let Some(data_dir) = std::env::args_os().nth(1) else {
        return ExitCode::SUCCESS;
    };
    match summarize(AppConfig::from_env(data_dir)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(config: AppConfig) -> AppResult<()> {
    let context = AppContext::open(config)?;
    let places = context.store().get_all()?;
    println!("db_path={}", context.config().db_path.display());
    println!("places={}", places.len());
    if let Some(newest) = places.first() {
        println!("newest_id={}", newest.id);
    }
    let with_images = places
        .iter()
        .filter(|place| place.image_uri.is_some())
        .count();
    println!("places_with_image={with_images}");
    context.close()
}
