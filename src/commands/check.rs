//! Check command implementation.
//!
//! Validates configuration and, on request, queries the discovery backend once.

use herakles_jvm_exporter::identity::normalize_service_name;

use crate::config::{validate_effective_config, Config};

/// Validates configuration and discovery reachability.
pub async fn command_check(
    discovery: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles JVM Exporter - System Check");
    println!("=======================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => {
            println!("   ✅ Configuration is valid");
            println!("   ✅ Discovery backend: {}", config.discovery.backend);
        }
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Query the discovery backend
    if all_ok && (discovery || all) {
        println!("\n🛰️  Querying discovery backend...");
        let backend = config.build_discovery()?;
        let ignored: Vec<String> = config
            .ignore_services
            .iter()
            .flatten()
            .map(|name| normalize_service_name(name))
            .collect();

        match backend.list_service_names().await {
            Ok(names) => {
                println!("   ✅ {} services listed", names.len());
                for name in names {
                    let marker = if ignored.contains(&normalize_service_name(&name)) {
                        " (ignored)"
                    } else {
                        ""
                    };
                    match backend.list_instances(&name).await {
                        Ok(instances) => {
                            println!("   ├─ {}{}: {} instances", name, marker, instances.len());
                            for instance in instances {
                                println!("   │  └─ {}", instance.identity().uri());
                            }
                        }
                        Err(e) => {
                            println!("   ├─ ❌ {}: {}", name, e);
                            all_ok = false;
                        }
                    }
                }
            }
            Err(e) => {
                println!("   ❌ Discovery failed: {}", e);
                all_ok = false;
            }
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - exporter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
