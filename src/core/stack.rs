use crate::config::env::StackEnv;
use crate::config::toml_config::Settings;
use crate::core::paths::DEFAULT_AWS_REGION;
use crate::domain::service::{
    Dependency, HealthCheck, RestartPolicy, ServiceDefinition, ServiceSource,
};
use crate::utils::error::{Result, WqError};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const DB_SERVICE: &str = "db";
pub const JUPYTER_SERVICE: &str = "jupyter";
pub const EXPLORER_SERVICE: &str = "explorer";

pub const DB_CONTAINER_PORT: u16 = 5432;
pub const JUPYTER_CONTAINER_PORT: u16 = 9988;
pub const EXPLORER_CONTAINER_PORT: u16 = 8080;

/// The database, notebook and dashboard services wired to one PostGIS instance.
#[derive(Debug, Clone)]
pub struct Stack {
    services: Vec<ServiceDefinition>,
}

impl Stack {
    pub fn new(services: Vec<ServiceDefinition>) -> Self {
        Self { services }
    }

    pub fn from_env(env: &StackEnv, settings: &Settings) -> Self {
        // Exec form: user and database names never pass through a shell.
        let pg_isready = [
            "CMD",
            "pg_isready",
            "-h",
            "localhost",
            "-U",
            env.postgres_user.as_str(),
            "-d",
            env.postgres_db.as_str(),
        ];
        let healthcheck =
            settings.health_policy(pg_isready.iter().map(|arg| arg.to_string()).collect());

        let db = ServiceDefinition::new(DB_SERVICE, ServiceSource::Image(settings.stack.db_image.clone()))
            .with_env("POSTGRES_DB", env.postgres_db.as_str())
            .with_env("POSTGRES_USER", env.postgres_user.as_str())
            .with_env("POSTGRES_PASS", env.postgres_pass.as_str())
            .with_env("ALLOW_IP_RANGE", env.allow_ip_range.as_str())
            .with_env("POSTGRES_MULTIPLE_EXTENSIONS", env.extensions_list())
            .with_env("FORCE_SSL", "TRUE")
            .with_port(env.postgres_port, DB_CONTAINER_PORT)
            .with_restart(RestartPolicy::OnFailure)
            .with_healthcheck(healthcheck);

        let jupyter = ServiceDefinition::new(
            JUPYTER_SERVICE,
            ServiceSource::Build {
                context: settings.stack.jupyter_build_context.clone(),
                dockerfile: None,
            },
        )
        .with_env("ODC_DEFAULT_DB_HOSTNAME", DB_SERVICE)
        .with_env("ODC_DEFAULT_DB_PORT", DB_CONTAINER_PORT.to_string())
        .with_env("ODC_DEFAULT_DB_DATABASE", env.postgres_db.as_str())
        .with_env("ODC_DEFAULT_DB_USERNAME", env.postgres_user.as_str())
        .with_env("ODC_DEFAULT_DB_PASSWORD", env.postgres_pass.as_str())
        .with_env("AWS_NO_SIGN_REQUEST", "YES")
        .with_env("AWS_DEFAULT_REGION", DEFAULT_AWS_REGION)
        .with_env("GS_NO_SIGN_REQUEST", "YES")
        .with_port(env.jupyter_port, JUPYTER_CONTAINER_PORT)
        .with_volume(&format!(".:{}", settings.stack.jupyter_workdir))
        .with_dependency(Dependency::healthy(DB_SERVICE))
        .with_restart(RestartPolicy::Always);

        // Explorer follows datacube-explorer's own DB_* naming.
        let explorer = ServiceDefinition::new(
            EXPLORER_SERVICE,
            ServiceSource::Image(settings.stack.explorer_image.clone()),
        )
        .with_env("DB_HOSTNAME", DB_SERVICE)
        .with_env("DB_PORT", DB_CONTAINER_PORT.to_string())
        .with_env("DB_DATABASE", env.postgres_db.as_str())
        .with_env("DB_USERNAME", env.postgres_user.as_str())
        .with_env("DB_PASSWORD", env.postgres_pass.as_str())
        .with_env("ODC_DEFAULT_INDEX_DRIVER", "postgres")
        .with_env("ODC_POSTGIS_INDEX_DRIVER", "postgis")
        .with_env("CUBEDASH_DEFAULT_TIMEZONE", env.cubedash_default_timezone.as_str())
        .with_port(env.explorer_port, EXPLORER_CONTAINER_PORT)
        .with_dependency(Dependency::started(DB_SERVICE));

        Self::new(vec![db, jupyter, explorer])
    }

    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn render_compose(&self) -> Result<String> {
        let file = ComposeFile {
            services: self
                .services
                .iter()
                .map(|s| (s.name.clone(), ComposeService::from(s)))
                .collect(),
        };
        Ok(serde_yaml::to_string(&file)?)
    }

    /// Groups services into waves: every service starts after all of its
    /// dependencies, services in one wave start in parallel.
    pub fn startup_plan(&self) -> Result<StartupPlan> {
        let names: BTreeSet<&str> = self.services.iter().map(|s| s.name.as_str()).collect();

        let mut pending: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for service in &self.services {
            let mut deps = BTreeSet::new();
            for dep in &service.depends_on {
                if !names.contains(dep.service.as_str()) {
                    return Err(WqError::ConfigValidationError {
                        field: format!("{}.depends_on", service.name),
                        message: format!("unknown service '{}'", dep.service),
                    });
                }
                deps.insert(dep.service.as_str());
            }
            pending.insert(service.name.as_str(), deps);
        }

        let mut waves = Vec::new();
        let mut started: BTreeSet<&str> = BTreeSet::new();
        while !pending.is_empty() {
            let ready: Vec<&str> = pending
                .iter()
                .filter(|(_, deps)| deps.iter().all(|d| started.contains(d)))
                .map(|(name, _)| *name)
                .collect();

            if ready.is_empty() {
                return Err(WqError::DependencyCycleError {
                    services: pending.keys().map(|name| name.to_string()).collect(),
                });
            }

            for name in &ready {
                pending.remove(name);
                started.insert(*name);
            }
            waves.push(ready.into_iter().map(str::to_string).collect());
        }

        let mut edges = Vec::new();
        for service in &self.services {
            for dep in &service.depends_on {
                let target_has_healthcheck = self
                    .service(&dep.service)
                    .map(|t| t.healthcheck.is_some())
                    .unwrap_or(false);
                edges.push(StartupEdge {
                    service: service.name.clone(),
                    depends_on: dep.service.clone(),
                    health_gated: dep.is_health_gated(),
                    target_has_healthcheck,
                });
            }
        }

        Ok(StartupPlan { waves, edges })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupEdge {
    pub service: String,
    pub depends_on: String,
    pub health_gated: bool,
    pub target_has_healthcheck: bool,
}

#[derive(Debug, Clone)]
pub struct StartupPlan {
    pub waves: Vec<Vec<String>>,
    pub edges: Vec<StartupEdge>,
}

impl StartupPlan {
    pub fn wave_of(&self, service: &str) -> Option<usize> {
        self.waves
            .iter()
            .position(|wave| wave.iter().any(|name| name == service))
    }

    /// Edges that may connect before a health-checked dependency is ready.
    pub fn ungated_dependencies(&self) -> Vec<&StartupEdge> {
        self.edges
            .iter()
            .filter(|edge| edge.target_has_healthcheck && !edge.health_gated)
            .collect()
    }
}

#[derive(Serialize)]
struct ComposeFile {
    services: BTreeMap<String, ComposeService>,
}

#[derive(Serialize)]
struct ComposeService {
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build: Option<ComposeBuild>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    environment: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    depends_on: BTreeMap<String, ComposeDependency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restart: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    healthcheck: Option<ComposeHealthCheck>,
}

#[derive(Serialize)]
struct ComposeBuild {
    context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dockerfile: Option<String>,
}

#[derive(Serialize)]
struct ComposeDependency {
    condition: crate::domain::service::DependencyCondition,
}

#[derive(Serialize)]
struct ComposeHealthCheck {
    test: Vec<String>,
    interval: String,
    timeout: String,
    retries: u32,
    start_period: String,
}

impl From<&HealthCheck> for ComposeHealthCheck {
    fn from(check: &HealthCheck) -> Self {
        Self {
            test: check.test.clone(),
            interval: format!("{}s", check.interval.as_secs()),
            timeout: format!("{}s", check.timeout.as_secs()),
            retries: check.retries,
            start_period: format!("{}s", check.start_period.as_secs()),
        }
    }
}

impl From<&ServiceDefinition> for ComposeService {
    fn from(service: &ServiceDefinition) -> Self {
        let (image, build) = match &service.source {
            ServiceSource::Image(image) => (Some(image.clone()), None),
            ServiceSource::Build { context, dockerfile } => (
                None,
                Some(ComposeBuild {
                    context: context.clone(),
                    dockerfile: dockerfile.clone(),
                }),
            ),
        };

        Self {
            image,
            build,
            environment: service.environment.clone(),
            ports: service.ports.iter().map(|p| p.to_string()).collect(),
            volumes: service.volumes.clone(),
            depends_on: service
                .depends_on
                .iter()
                .map(|d| (d.service.clone(), ComposeDependency { condition: d.condition }))
                .collect(),
            restart: match service.restart {
                RestartPolicy::No => None,
                other => Some(other.to_string()),
            },
            healthcheck: service.healthcheck.as_ref().map(ComposeHealthCheck::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service::DependencyCondition;

    fn sample_env() -> StackEnv {
        StackEnv {
            postgres_port: 5432,
            postgres_db: "opendatacube".to_string(),
            postgres_user: "odc".to_string(),
            postgres_pass: "secret".to_string(),
            allow_ip_range: "0.0.0.0/0".to_string(),
            postgres_multiple_extensions: vec!["postgis".to_string(), "hstore".to_string()],
            jupyter_port: 9988,
            explorer_port: 8080,
            cubedash_default_timezone: "Africa/Johannesburg".to_string(),
        }
    }

    fn sample_stack() -> Stack {
        Stack::from_env(&sample_env(), &Settings::default())
    }

    #[test]
    fn test_db_healthcheck_uses_exec_form() {
        let mut env = sample_env();
        env.postgres_user = "odc; rm -rf /".to_string();
        env.postgres_db = "open data cube".to_string();
        let stack = Stack::from_env(&env, &Settings::default());

        let check = stack.service(DB_SERVICE).unwrap().healthcheck.as_ref().unwrap();
        assert_eq!(
            check.test,
            vec![
                "CMD",
                "pg_isready",
                "-h",
                "localhost",
                "-U",
                "odc; rm -rf /",
                "-d",
                "open data cube"
            ]
        );

        let compose: serde_yaml::Value = serde_yaml::from_str(&stack.render_compose().unwrap()).unwrap();
        let test = &compose["services"]["db"]["healthcheck"]["test"];
        assert_eq!(test[0].as_str(), Some("CMD"));
        assert_eq!(test[5].as_str(), Some("odc; rm -rf /"));
    }

    #[test]
    fn test_services_wiring() {
        let stack = sample_stack();
        assert_eq!(stack.services().len(), 3);

        let db = stack.service(DB_SERVICE).unwrap();
        assert_eq!(db.restart, RestartPolicy::OnFailure);
        assert_eq!(db.environment.get("FORCE_SSL").unwrap(), "TRUE");
        assert_eq!(db.environment.get("POSTGRES_MULTIPLE_EXTENSIONS").unwrap(), "postgis,hstore");
        let check = db.healthcheck.as_ref().unwrap();
        assert_eq!(check.interval.as_secs(), 90);
        assert_eq!(check.timeout.as_secs(), 10);
        assert_eq!(check.retries, 3);
        assert_eq!(check.start_period.as_secs(), 60);

        let jupyter = stack.service(JUPYTER_SERVICE).unwrap();
        assert_eq!(jupyter.restart, RestartPolicy::Always);
        assert_eq!(jupyter.environment.get("AWS_NO_SIGN_REQUEST").unwrap(), "YES");
        assert_eq!(jupyter.environment.get("AWS_DEFAULT_REGION").unwrap(), "af-south-1");
        assert_eq!(jupyter.depends_on[0].condition, DependencyCondition::ServiceHealthy);

        let explorer = stack.service(EXPLORER_SERVICE).unwrap();
        assert_eq!(explorer.restart, RestartPolicy::No);
        assert_eq!(explorer.environment.get("DB_USERNAME").unwrap(), "odc");
        assert_eq!(explorer.depends_on[0].condition, DependencyCondition::ServiceStarted);
    }

    #[test]
    fn test_port_mappings() {
        let stack = sample_stack();
        let port = |name: &str| stack.service(name).unwrap().ports[0].to_string();

        assert_eq!(port(DB_SERVICE), "5432:5432");
        assert_eq!(port(JUPYTER_SERVICE), "9988:9988");
        assert_eq!(port(EXPLORER_SERVICE), "8080:8080");
    }

    #[test]
    fn test_startup_plan() {
        let plan = sample_stack().startup_plan().unwrap();

        assert_eq!(plan.waves.len(), 2);
        assert_eq!(plan.waves[0], vec!["db"]);
        assert_eq!(plan.waves[1], vec!["explorer", "jupyter"]);
        assert_eq!(plan.wave_of("jupyter"), Some(1));

        let ungated = plan.ungated_dependencies();
        assert_eq!(ungated.len(), 1);
        assert_eq!(ungated[0].service, "explorer");
        assert_eq!(ungated[0].depends_on, "db");
    }

    #[test]
    fn test_startup_plan_rejects_cycles_and_unknown_services() {
        let a = ServiceDefinition::new("a", ServiceSource::Image("a".to_string()))
            .with_dependency(Dependency::started("b"));
        let b = ServiceDefinition::new("b", ServiceSource::Image("b".to_string()))
            .with_dependency(Dependency::started("a"));
        match Stack::new(vec![a, b]).startup_plan() {
            Err(WqError::DependencyCycleError { services }) => assert_eq!(services, vec!["a", "b"]),
            other => panic!("expected cycle error, got {:?}", other),
        }

        let orphan = ServiceDefinition::new("c", ServiceSource::Image("c".to_string()))
            .with_dependency(Dependency::healthy("missing"));
        assert!(Stack::new(vec![orphan]).startup_plan().is_err());
    }

    #[test]
    fn test_render_compose() {
        let yaml = sample_stack().render_compose().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        let services = &parsed["services"];
        assert_eq!(services["db"]["ports"][0].as_str(), Some("5432:5432"));
        assert_eq!(services["db"]["restart"].as_str(), Some("on-failure"));
        assert_eq!(services["db"]["healthcheck"]["interval"].as_str(), Some("90s"));
        assert_eq!(services["db"]["healthcheck"]["start_period"].as_str(), Some("60s"));
        assert_eq!(services["jupyter"]["build"]["context"].as_str(), Some("."));
        assert_eq!(
            services["jupyter"]["depends_on"]["db"]["condition"].as_str(),
            Some("service_healthy")
        );
        assert_eq!(
            services["explorer"]["depends_on"]["db"]["condition"].as_str(),
            Some("service_started")
        );
        assert!(services["explorer"].get("restart").is_none());
    }
}
