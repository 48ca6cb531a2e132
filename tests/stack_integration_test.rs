use anyhow::Result;
use deafrica_water_quality::adapters::TcpProbe;
use deafrica_water_quality::core::health::wait_until_healthy;
use deafrica_water_quality::domain::model::HealthStatus;
use deafrica_water_quality::domain::service::HealthCheck;
use deafrica_water_quality::{EnvFile, Settings, Stack, StackEnv, WqError};
use std::time::Duration;
use tempfile::TempDir;

const ENV_FILE: &str = "\
# database
POSTGRES_PORT=15432
POSTGRES_DB=opendatacube
POSTGRES_USER=odc
POSTGRES_PASS=\"s3cret\"

export JUPYTER_PORT=19988
EXPLORER_PORT=18080 # explorer UI
";

fn stack_env(file: &EnvFile) -> deafrica_water_quality::Result<StackEnv> {
    // Ignore the process environment so the host shell cannot leak in.
    StackEnv::resolve(|key| file.get(key).map(str::to_string))
}

#[test]
fn test_env_file_drives_compose_rendering() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let env_path = temp_dir.path().join(".env");
    std::fs::write(&env_path, ENV_FILE)?;

    let file = EnvFile::from_file(&env_path)?;
    let env = stack_env(&file)?;
    env.check_port_conflicts()?;
    assert_eq!(env.postgres_pass, "s3cret");
    assert_eq!(env.allow_ip_range, "0.0.0.0/0");
    assert_eq!(env.cubedash_default_timezone, "Africa/Johannesburg");

    let stack = Stack::from_env(&env, &Settings::default());
    let yaml = stack.render_compose()?;
    let compose: serde_yaml::Value = serde_yaml::from_str(&yaml)?;

    let services = &compose["services"];
    assert_eq!(services["db"]["ports"][0].as_str(), Some("15432:5432"));
    assert_eq!(services["jupyter"]["ports"][0].as_str(), Some("19988:9988"));
    assert_eq!(services["explorer"]["ports"][0].as_str(), Some("18080:8080"));
    assert_eq!(
        services["jupyter"]["depends_on"]["db"]["condition"].as_str(),
        Some("service_healthy")
    );
    assert_eq!(services["db"]["healthcheck"]["interval"].as_str(), Some("90s"));
    assert_eq!(
        services["db"]["environment"]["POSTGRES_MULTIPLE_EXTENSIONS"].as_str(),
        Some("postgis,hstore,postgis_topology,postgis_raster,pgrouting")
    );

    let plan = stack.startup_plan()?;
    assert_eq!(plan.wave_of("db"), Some(0));
    assert_eq!(plan.wave_of("jupyter"), Some(1));
    assert_eq!(plan.wave_of("explorer"), Some(1));
    let ungated: Vec<&str> = plan
        .ungated_dependencies()
        .iter()
        .map(|edge| edge.service.as_str())
        .collect();
    assert_eq!(ungated, vec!["explorer"]);
    Ok(())
}

#[test]
fn test_missing_variables_are_reported_together() -> Result<()> {
    let file = EnvFile::parse("POSTGRES_PORT=5432\nPOSTGRES_DB=\nJUPYTER_PORT=9988\n")?;

    match stack_env(&file) {
        Err(WqError::MissingEnvironmentError { variables }) => {
            assert_eq!(
                variables,
                vec!["POSTGRES_DB", "POSTGRES_USER", "POSTGRES_PASS", "EXPLORER_PORT"]
            );
        }
        other => panic!("expected missing variables, got {:?}", other),
    }
    Ok(())
}

#[test]
fn test_duplicate_host_ports_are_rejected() -> Result<()> {
    let file = EnvFile::parse(&ENV_FILE.replace("EXPLORER_PORT=18080", "EXPLORER_PORT=19988"))?;
    let env = stack_env(&file)?;

    let err = env.check_port_conflicts().unwrap_err();
    assert!(err.to_string().contains("EXPLORER_PORT"));
    Ok(())
}

#[tokio::test]
async fn test_wait_for_listening_database_port() -> Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let probe = TcpProbe::new("127.0.0.1", port);

    let mut policy = HealthCheck::new(vec!["CMD".to_string(), "tcp-connect".to_string()]);
    policy.interval = Duration::from_millis(10);
    policy.timeout = Duration::from_millis(500);

    let report = wait_until_healthy(&probe, policy).await?;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert_eq!(report.attempts, 1);
    assert_eq!(report.target, format!("127.0.0.1:{}", port));
    Ok(())
}

#[tokio::test]
async fn test_closed_port_becomes_unhealthy() -> Result<()> {
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };
    let probe = TcpProbe::new("127.0.0.1", port);

    let mut policy = HealthCheck::new(vec!["CMD".to_string(), "tcp-connect".to_string()]);
    policy.interval = Duration::from_millis(5);
    policy.timeout = Duration::from_millis(200);
    policy.retries = 2;
    policy.start_period = Duration::ZERO;

    match wait_until_healthy(&probe, policy).await {
        Err(WqError::HealthCheckFailed { attempts, .. }) => assert_eq!(attempts, 2),
        other => panic!("expected health check failure, got {:?}", other),
    }
    Ok(())
}
