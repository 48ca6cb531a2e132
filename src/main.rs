use clap::Parser;
use deafrica_water_quality::adapters::{get_filesystem, TcpProbe};
use deafrica_water_quality::config::toml_config::StorageSettings;
use deafrica_water_quality::config::{CliConfig, Command, EnvFile, FileKind, PyProject, Settings, StackEnv};
use deafrica_water_quality::core::transfer::{self, DownloadOptions};
use deafrica_water_quality::core::{discovery, health, paths};
use deafrica_water_quality::utils::error::{ErrorSeverity, Result, WqError};
use deafrica_water_quality::utils::{logger, validation::Validate};
use deafrica_water_quality::Stack;
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }
    tracing::debug!("CLI config: {:?}", cli);

    let settings = match load_settings(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&cli.command, &settings).await {
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn load_settings(path: &str) -> Result<Settings> {
    let settings = if Path::new(path).exists() {
        tracing::info!("📁 Loading settings from: {}", path);
        Settings::from_file(path)?
    } else {
        tracing::debug!("No settings file at {}, using defaults", path);
        Settings::default()
    };
    settings.validate()?;
    Ok(settings)
}

fn load_stack_env(env_file: &str) -> Result<StackEnv> {
    let file = if Path::new(env_file).exists() {
        EnvFile::from_file(env_file)?
    } else {
        tracing::warn!("⚠️  {} not found, reading variables from the shell only", env_file);
        EnvFile::default()
    };
    let env = StackEnv::from_env_file(&file)?;
    env.check_port_conflicts()?;
    Ok(env)
}

fn storage_for_region(settings: &Settings, region: Option<&str>) -> StorageSettings {
    let mut storage = settings.storage.clone();
    if let Some(region) = region {
        storage.aws_region = region.to_string();
    }
    storage
}

async fn run(command: &Command, settings: &Settings) -> Result<()> {
    let client = reqwest::Client::new();

    match command {
        Command::CheckEnv { env_file } => {
            let env = load_stack_env(env_file)?;
            tracing::info!("✅ {} is complete", env_file);
            println!("POSTGRES_PORT={}", env.postgres_port);
            println!("POSTGRES_DB={}", env.postgres_db);
            println!("POSTGRES_USER={}", env.postgres_user);
            println!("POSTGRES_PASS=********");
            println!("ALLOW_IP_RANGE={}", env.allow_ip_range);
            println!("POSTGRES_MULTIPLE_EXTENSIONS={}", env.extensions_list());
            println!("JUPYTER_PORT={}", env.jupyter_port);
            println!("EXPLORER_PORT={}", env.explorer_port);
            println!("CUBEDASH_DEFAULT_TIMEZONE={}", env.cubedash_default_timezone);
        }
        Command::Render { env_file, output } => {
            let env = load_stack_env(env_file)?;
            let yaml = Stack::from_env(&env, settings).render_compose()?;
            match output {
                Some(path) => {
                    tokio::fs::write(path, yaml).await?;
                    tracing::info!("📁 Compose file written to: {}", path);
                }
                None => print!("{}", yaml),
            }
        }
        Command::Plan { env_file } => {
            let env = load_stack_env(env_file)?;
            let plan = Stack::from_env(&env, settings).startup_plan()?;
            for edge in plan.ungated_dependencies() {
                tracing::warn!(
                    "⚠️  {} starts without waiting for {} to be healthy",
                    edge.service,
                    edge.depends_on
                );
            }
            for (index, wave) in plan.waves.iter().enumerate() {
                println!("{}: {}", index + 1, wave.join(", "));
            }
        }
        Command::WaitDb {
            env_file,
            host,
            port,
        } => {
            let port = match port {
                Some(port) => *port,
                None => load_stack_env(env_file)?.postgres_port,
            };
            let probe = TcpProbe::new(host, port);
            let policy = settings.health_policy(vec!["CMD".to_string(), "tcp-connect".to_string()]);
            let report = health::wait_until_healthy(&probe, policy).await?;
            println!(
                "{} is healthy after {} attempts ({:.1}s)",
                report.target,
                report.attempts,
                report.elapsed.as_secs_f64()
            );
        }
        Command::Manifest { path, python } => {
            let manifest = PyProject::from_file(path)?;
            println!("name: {}", manifest.project.name);
            if let Some(license) = manifest.license_name() {
                println!("license: {}", license);
            }
            if let Some(requires) = &manifest.project.requires_python {
                println!("requires-python: {}", requires);
            }
            for req in manifest.requirements()? {
                println!("dependency: {} {}", req.name, req.specifier);
            }
            for (group, reqs) in manifest.extras()? {
                let names: Vec<&str> = reqs.iter().map(|r| r.name.as_str()).collect();
                println!("extra {}: {}", group, names.join(", "));
            }
            let unpinned = manifest.unpinned_dependencies()?;
            if !unpinned.is_empty() {
                let names: Vec<&str> = unpinned.iter().map(|r| r.name.as_str()).collect();
                tracing::warn!("⚠️  Unpinned requirements: {}", names.join(", "));
            }
            if let Some(version) = python {
                if !manifest.python_supported(version)? {
                    return Err(WqError::InvalidConfigValueError {
                        field: "python".to_string(),
                        value: version.clone(),
                        reason: format!(
                            "does not satisfy requires-python {}",
                            manifest.project.requires_python.as_deref().unwrap_or("")
                        ),
                    });
                }
                println!("python {} is supported", version);
            }
        }
        Command::Find {
            directory,
            kind,
            pattern,
        } => {
            let fs = get_filesystem(directory, settings.storage.anon, &settings.storage, &client).await?;
            let files = match kind {
                FileKind::Geotiff => discovery::find_geotiff_files(fs.as_ref(), directory, pattern).await?,
                FileKind::Json => discovery::find_json_files(fs.as_ref(), directory, pattern).await?,
            };
            tracing::info!("🔍 Found {} files", files.len());
            for file in files {
                println!("{}", file);
            }
        }
        Command::Exists { path } => {
            let fs = get_filesystem(path, settings.storage.anon, &settings.storage, &client).await?;
            if discovery::check_file_exists(fs.as_ref(), path).await? {
                println!("file");
            } else if discovery::check_directory_exists(fs.as_ref(), path).await? {
                println!("directory");
            } else {
                println!("missing");
            }
        }
        Command::PublicUrl { uri, region } => {
            let storage = storage_for_region(settings, region.as_deref());
            println!("{}", transfer::public_url(uri, &storage)?);
        }
        Command::VsiPath { path } => {
            println!("{}", paths::gdal_vsi_path(path)?);
        }
        Command::LastModified { uri, region } => {
            let storage = storage_for_region(settings, region.as_deref());
            match transfer::get_last_modified(&client, uri, &storage).await? {
                Some(timestamp) => println!("{}", timestamp.to_rfc3339()),
                None => {
                    tracing::warn!("⚠️  No Last-Modified header for {}", uri);
                    println!("unknown");
                }
            }
        }
        Command::Download {
            url,
            output,
            chunk_mb,
            anon,
        } => {
            let options = DownloadOptions {
                chunk_size: settings.chunk_size_bytes(*chunk_mb)?,
                show_progress: true,
            };
            let fs = get_filesystem(output, *anon, &settings.storage, &client).await?;
            let result =
                transfer::download_file_from_url(&client, fs.as_ref(), url, output, options).await?;
            println!("📁 {} ({} bytes)", result.output_path, result.bytes_written);
        }
    }

    Ok(())
}
