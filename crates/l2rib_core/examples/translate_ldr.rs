//! Example: Translate an LDraw model and report its bound.
//!
//! Run with: cargo run --example translate_ldr -- model.ldr [ldraw-dir]

use std::env;

use l2rib_core::{Settings, Translator};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: translate_ldr <model.ldr|model.mpd> [ldraw-dir]");
        println!("\nExamples:");
        println!("  cargo run --example translate_ldr -- house.ldr /opt/ldraw");
        return;
    }

    let settings = Settings {
        ldraw_dir: args.get(2).map(Into::into),
        cache_dir: env::temp_dir().join("l2rib-cache"),
        ..Settings::default()
    };

    let path = &args[1];
    println!("Translating: {}", path);

    let mut translator = Translator::from_settings(&settings);
    match translator.translate_model(path) {
        Ok((translation, fragment)) => {
            let stats = translator.stats();
            println!("\n=== {} ===", path);
            println!("Fragment: {:.1} KB", fragment.len() as f32 / 1024.0);
            println!(
                "Parts: {} translated, {} cached, {} prebuilt, {} missing",
                stats.parts_translated, stats.cache_hits, stats.prebuilt_hits, stats.missing_parts
            );

            if translation.bound.is_empty() {
                println!("Bound: empty");
            } else {
                let (min, max) = (translation.bound.min(), translation.bound.max());
                println!("  Min: ({:.2}, {:.2}, {:.2})", min.x, min.y, min.z);
                println!("  Max: ({:.2}, {:.2}, {:.2})", max.x, max.y, max.z);
            }
        }
        Err(e) => {
            eprintln!("Error translating {}: {}", path, e);
        }
    }
}
