//! apkship CLI: build Android projects and ship the packages.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use apkship_sdk::{
    check_env, BuildType, Pipeline, PipelineOutcome, Project, ProjectStore, PublishConfig,
    PublishPlatform, PublishResult, Publisher,
};
use config::{ApkshipConfig, PublishDefaults};

#[derive(Parser)]
#[command(
    name = "apkship",
    version,
    about = "Build Android projects and publish the packages to Pgyer or fir.im"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the local Android toolchain is usable
    Env,

    /// Manage the registry of buildable projects
    Projects {
        #[command(subcommand)]
        command: ProjectsCommand,
    },

    /// Build a registered project and optionally publish the result
    Build {
        /// Registered project name
        #[arg(long)]
        project: String,

        /// Gradle module, overriding the registered default
        #[arg(long)]
        module: Option<String>,

        /// Product flavor, overriding the registered default
        #[arg(long)]
        variant: Option<String>,

        /// Build type, overriding the registered default
        #[arg(long, value_enum)]
        build_type: Option<BuildTypeArg>,

        /// Extra arguments passed through to the gradle wrapper
        #[arg(long = "args", num_args = 1.., allow_hyphen_values = true)]
        gradle_args: Vec<String>,

        /// Publish the built package to this platform
        #[arg(long, value_enum)]
        publish: Option<PlatformArg>,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Publish an existing .apk/.aab file
    Publish {
        /// Package file to upload
        #[arg(long)]
        file: PathBuf,

        /// Distribution platform
        #[arg(long, value_enum)]
        platform: Option<PlatformArg>,

        #[command(flatten)]
        credentials: CredentialArgs,
    },
}

#[derive(Subcommand)]
enum ProjectsCommand {
    /// List registered projects
    List,

    /// Register a project
    Add {
        /// Unique project name
        name: String,

        /// Path to the gradle project root
        path: PathBuf,

        /// Default gradle module
        #[arg(long)]
        module: Option<String>,

        /// Default product flavor
        #[arg(long)]
        variant: Option<String>,

        /// Default build type
        #[arg(long, value_enum, default_value = "debug")]
        build_type: BuildTypeArg,
    },

    /// Remove a project from the registry
    #[command(alias = "rm")]
    Delete {
        /// Registered project name
        name: String,
    },
}

/// Publish credentials and metadata shared by `build` and `publish`.
/// Every value falls back to `apkship.toml`, then the environment.
#[derive(Args)]
struct CredentialArgs {
    /// Pgyer API key (or PGYER_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// fir.im API token (or FIR_API_TOKEN)
    #[arg(long)]
    api_token: Option<String>,

    /// Install password for the uploaded build (Pgyer)
    #[arg(long)]
    password: Option<String>,

    /// Release notes attached to the upload
    #[arg(long)]
    changelog: Option<String>,

    /// Pgyer install policy: 1 = public, 2 = password, 3 = invite
    #[arg(long)]
    install_type: Option<u8>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BuildTypeArg {
    Debug,
    Release,
}

impl From<BuildTypeArg> for BuildType {
    fn from(value: BuildTypeArg) -> Self {
        match value {
            BuildTypeArg::Debug => BuildType::Debug,
            BuildTypeArg::Release => BuildType::Release,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlatformArg {
    Pgyer,
    Fir,
}

impl From<PlatformArg> for PublishPlatform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Pgyer => PublishPlatform::Pgyer,
            PlatformArg::Fir => PublishPlatform::Fir,
        }
    }
}

fn main() -> Result<()> {
    // Local overrides for API credentials; absence is fine.
    let _ = dotenvy::from_path(Path::new(".env.local"));

    let cli = Cli::parse();
    let config = ApkshipConfig::discover()?;

    match cli.command {
        Command::Env => run_env(),
        Command::Projects { command } => run_projects(command, &config),
        Command::Build {
            project,
            module,
            variant,
            build_type,
            gradle_args,
            publish,
            credentials,
        } => run_build(
            &config,
            &project,
            module,
            variant,
            build_type,
            gradle_args,
            publish,
            credentials,
        ),
        Command::Publish {
            file,
            platform,
            credentials,
        } => run_publish(&config, &file, platform, credentials),
    }
}

fn run_env() -> Result<()> {
    let mut all_ok = true;
    for check in check_env() {
        let marker = if check.ok { "ok  " } else { "FAIL" };
        match &check.detail {
            Some(detail) => println!("{marker} {}: {} ({detail})", check.tool, check.message),
            None => println!("{marker} {}: {}", check.tool, check.message),
        }
        all_ok &= check.ok;
    }
    if !all_ok {
        std::process::exit(1);
    }
    Ok(())
}

fn run_projects(command: ProjectsCommand, config: &ApkshipConfig) -> Result<()> {
    let store = ProjectStore::open(&config.registry.path);
    match command {
        ProjectsCommand::List => {
            let projects = store.list().context("reading project registry")?;
            if projects.is_empty() {
                println!("no projects registered; use `apkship projects add`");
                return Ok(());
            }
            for project in projects {
                let mut details = vec![format!("buildType={}", project.build_type.as_str())];
                if let Some(module) = &project.module {
                    details.insert(0, format!("module={module}"));
                }
                if let Some(variant) = &project.variant {
                    details.push(format!("variant={variant}"));
                }
                println!(
                    "- {}: {} ({})",
                    project.name,
                    project.path.display(),
                    details.join(", ")
                );
            }
        }
        ProjectsCommand::Add {
            name,
            path,
            module,
            variant,
            build_type,
        } => {
            let project = Project {
                name: name.clone(),
                path,
                module,
                variant,
                build_type: build_type.into(),
            };
            store
                .add(project)
                .with_context(|| format!("registering project '{name}'"))?;
            println!("registered project '{name}'");
        }
        ProjectsCommand::Delete { name } => {
            store
                .delete(&name)
                .with_context(|| format!("deleting project '{name}'"))?;
            println!("deleted project '{name}'");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_build(
    config: &ApkshipConfig,
    project_name: &str,
    module: Option<String>,
    variant: Option<String>,
    build_type: Option<BuildTypeArg>,
    gradle_args: Vec<String>,
    publish: Option<PlatformArg>,
    credentials: CredentialArgs,
) -> Result<()> {
    let store = ProjectStore::open(&config.registry.path);
    let project = store
        .find(project_name)
        .context("reading project registry")?
        .with_context(|| {
            format!("project '{project_name}' is not registered; use `apkship projects add`")
        })?;

    let target = project.target(module, variant, build_type.map(Into::into));

    let publish_config = match publish {
        Some(platform) => Some(resolve_publish_config(
            platform.into(),
            &credentials,
            &config.publish,
        )?),
        None => None,
    };

    let pipeline = Pipeline::new().context("initializing pipeline")?;
    let outcome = pipeline.run(&target, &gradle_args, publish_config.as_ref())?;

    match &outcome {
        PipelineOutcome::Built(_) => println!("build succeeded"),
        PipelineOutcome::BuildFailed(build) => {
            eprintln!("build failed with exit code {}", build.exit_code)
        }
        PipelineOutcome::BuiltNothingToPublish { message, .. } => println!("{message}"),
        PipelineOutcome::Published { publish, .. } => print_publish_result(publish),
        PipelineOutcome::PublishFailed { publish, .. } => print_publish_result(publish),
    }

    let code = outcome.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn run_publish(
    config: &ApkshipConfig,
    file: &Path,
    platform: Option<PlatformArg>,
    credentials: CredentialArgs,
) -> Result<()> {
    let platform = match platform {
        Some(platform) => platform.into(),
        None => config
            .publish
            .platform
            .context("no platform given; pass --platform or set publish.platform in apkship.toml")?,
    };
    let publish_config = resolve_publish_config(platform, &credentials, &config.publish)?;

    let publisher = Publisher::new().context("initializing upload client")?;
    let result = publisher.publish(file, &publish_config);
    print_publish_result(&result);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}

fn print_publish_result(result: &PublishResult) {
    if result.success {
        println!("publish succeeded: {}", result.message);
        if let Some(url) = &result.download_url {
            println!("download: {url}");
        }
        if let Some(url) = &result.qr_code_url {
            println!("qr code: {url}");
        }
    } else {
        eprintln!("publish failed: {}", result.message);
    }
}

/// Merges CLI flags, `apkship.toml` defaults, and environment
/// variables into one publish config. Only the credential the chosen
/// platform needs is resolved; a credential that stays unresolved is
/// left for the publisher to report.
fn resolve_publish_config(
    platform: PublishPlatform,
    args: &CredentialArgs,
    defaults: &PublishDefaults,
) -> Result<PublishConfig> {
    let api_key = match platform {
        PublishPlatform::Pgyer => {
            resolve_secret(args.api_key.as_deref(), defaults.api_key.as_deref(), "PGYER_API_KEY")?
        }
        PublishPlatform::Fir => None,
    };
    let api_token = match platform {
        PublishPlatform::Fir => resolve_secret(
            args.api_token.as_deref(),
            defaults.api_token.as_deref(),
            "FIR_API_TOKEN",
        )?,
        PublishPlatform::Pgyer => None,
    };

    Ok(PublishConfig {
        platform,
        api_key,
        api_token,
        password: args.password.clone().or_else(|| defaults.password.clone()),
        changelog: args.changelog.clone().or_else(|| defaults.changelog.clone()),
        install_type: args.install_type.or(defaults.install_type),
    })
}

/// Flag > config file > environment. Config values may be `${VAR}`
/// references, expanded here so secrets stay out of the file.
fn resolve_secret(
    flag: Option<&str>,
    from_config: Option<&str>,
    env_key: &str,
) -> Result<Option<String>> {
    if let Some(value) = flag.filter(|v| !v.is_empty()) {
        return Ok(Some(value.to_string()));
    }
    if let Some(raw) = from_config.filter(|v| !v.is_empty()) {
        let value = expand_env_var(raw)?;
        if !value.is_empty() {
            return Ok(Some(value));
        }
    }
    Ok(std::env::var(env_key).ok().filter(|v| !v.is_empty()))
}

/// Expands a `${VAR_NAME}` reference to the variable's value. Plain
/// strings pass through untouched.
fn expand_env_var(value: &str) -> Result<String> {
    if let Some(name) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        return std::env::var(name)
            .with_context(|| format!("environment variable {name} referenced in config is not set"));
    }
    Ok(value.to_string())
}
