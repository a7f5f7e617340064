//! chart-values CLI
//!
//! Entry point for the `chart-values` command-line tool.

use chart_values::config::EffectiveConfig;
use chart_values::{
    logging, to_yaml_string, ConfigTree, HelmRenderer, LabelResolver, LabelScope, LayerStack,
    Renderer, ValuesLayer, REPO_CONFIG_FILE,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use values_tree::parse_path;

#[derive(Parser)]
#[command(name = "chart-values")]
#[command(about = "Layered Helm chart values, labels and rendered manifests", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge values layers and print the result
    Merge {
        #[command(flatten)]
        values: ValuesArgs,

        /// Output JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Resolve the labels a chart stamps on its resources
    Labels {
        #[command(flatten)]
        values: ValuesArgs,

        /// Label scope
        #[arg(long, value_enum, default_value_t = LabelScope::Common)]
        scope: LabelScope,

        /// Values path of the chart (default from config: gitlab.spamcheck)
        #[arg(long)]
        chart_path: Option<String>,

        /// Path to tool config file (default: .chart-values.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Render the chart with helm and query the manifests
    Render {
        #[command(flatten)]
        values: ValuesArgs,

        /// Path to tool config file (default: .chart-values.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Chart directory
        #[arg(long)]
        chart: Option<PathBuf>,

        /// Release name
        #[arg(long)]
        release: Option<String>,

        /// Namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Print every manifest of this kind
        #[arg(long, conflicts_with = "dig")]
        kind: Option<String>,

        /// Print one manifest, addressed as Kind/Name
        #[arg(long, value_name = "KIND/NAME")]
        dig: Option<String>,

        /// Dotted path inside the manifest selected by --dig
        #[arg(long, requires = "dig")]
        path: Option<String>,
    },

    /// Show the effective tool configuration
    Config {
        /// Path to tool config file (default: .chart-values.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ValuesArgs {
    /// Values files, lowest precedence first
    files: Vec<PathBuf>,

    /// Set a value (PATH=VALUE), applied after the files
    #[arg(long = "set", value_name = "PATH=VALUE")]
    set: Vec<String>,

    /// Set a string value (PATH=VALUE), applied after --set
    #[arg(long = "set-string", value_name = "PATH=VALUE")]
    set_string: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Merge { values, json } => {
            run_merge(&values, json);
        }
        Commands::Labels {
            values,
            scope,
            chart_path,
            config,
            json,
        } => {
            run_labels(&values, scope, chart_path, config, json);
        }
        Commands::Render {
            values,
            config,
            chart,
            release,
            namespace,
            kind,
            dig,
            path,
        } => {
            let overrides = render_overrides(chart, release, namespace);
            run_render(&values, config, overrides, kind, dig, path);
        }
        Commands::Config { config, json } => {
            run_config(config, json);
        }
    }
}

fn run_merge(values: &ValuesArgs, json: bool) {
    let merged = load_stack(values).compose();
    print_tree(&merged, json);
}

fn run_labels(
    values: &ValuesArgs,
    scope: LabelScope,
    chart_path: Option<String>,
    config_path: Option<PathBuf>,
    json: bool,
) {
    let resolver = match chart_path {
        Some(path) => LabelResolver::with_chart_path(&path).unwrap_or_else(|e| fail(&e.to_string())),
        None => load_config(config_path, None)
            .label_resolver()
            .unwrap_or_else(|e| fail(&format!("Configuration error: {}", e))),
    };

    let labels = match resolver.resolve(&load_stack(values).compose(), scope) {
        Ok(labels) => labels,
        Err(e) => fail(&format!("Label error: {}", e)),
    };

    if json {
        match serde_json::to_string_pretty(&labels) {
            Ok(out) => println!("{}", out),
            Err(e) => fail(&format!("Error serializing output: {}", e)),
        }
    } else {
        for (key, value) in &labels {
            println!("{}={}", key, value);
        }
    }
}

fn run_render(
    values: &ValuesArgs,
    config_path: Option<PathBuf>,
    overrides: Option<ConfigTree>,
    kind: Option<String>,
    dig: Option<String>,
    path: Option<String>,
) {
    let config = load_config(config_path, overrides);
    let settings = match config.helm_settings() {
        Ok(s) => s,
        Err(e) => fail(&format!("Configuration error: {}", e)),
    };

    let merged = load_stack(values).compose();
    let result = match HelmRenderer::new(settings).render(&merged) {
        Ok(r) => r,
        Err(e) => fail(&format!("Render error: {}", e)),
    };

    if !result.is_success() {
        eprintln!("helm exited with code {}", result.exit_code());
        eprint!("{}", result.stderr());
        process::exit(if result.exit_code() > 0 { result.exit_code() } else { 1 });
    }

    let manifests = result.manifests();

    if let Some(key) = dig {
        let manifest = match manifests.get(&key) {
            Some(m) => m,
            None => fail(&format!("No rendered resource {}", key)),
        };
        let value = match path {
            Some(path) => {
                let segments = match parse_path(&path) {
                    Ok(s) => s,
                    Err(e) => fail(&e.to_string()),
                };
                match manifest.body.get_path(&segments) {
                    Some(v) => v,
                    None => fail(&format!("{} has no value at {}", key, path)),
                }
            }
            None => &manifest.body,
        };
        print_tree(value, false);
    } else if let Some(kind) = kind {
        for body in manifests.resources_by_kind(&kind).values() {
            println!("---");
            print_tree(body, false);
        }
    } else {
        for key in manifests.keys() {
            println!("{}", key);
        }
    }
}

fn run_config(config_path: Option<PathBuf>, json: bool) {
    let config = load_config(config_path, None);

    if json {
        match config.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => fail(&format!("Error serializing output: {}", e)),
        }
        return;
    }

    for source in &config.sources {
        match &source.path {
            Some(path) => println!("# {:?}: {}", source.origin, path),
            None => println!("# {:?}", source.origin),
        }
    }
    print_tree(&config.config, false);
}

/// Files first, then --set, then --set-string
fn load_stack(values: &ValuesArgs) -> LayerStack {
    let mut stack = LayerStack::new();

    for file in &values.files {
        match ValuesLayer::from_file(file) {
            Ok(layer) => stack.push(layer),
            Err(e) => fail(&format!("Error loading values: {}", e)),
        };
    }
    for expression in &values.set {
        match ValuesLayer::from_set(expression) {
            Ok(layer) => stack.push(layer),
            Err(e) => fail(&e.to_string()),
        };
    }
    for expression in &values.set_string {
        match ValuesLayer::from_set_string(expression) {
            Ok(layer) => stack.push(layer),
            Err(e) => fail(&e.to_string()),
        };
    }

    stack
}

fn load_config(config_path: Option<PathBuf>, overrides: Option<ConfigTree>) -> EffectiveConfig {
    let repo_path = config_path.unwrap_or_else(|| PathBuf::from(REPO_CONFIG_FILE));
    let host_path = host_config_path();

    match EffectiveConfig::build(host_path.as_deref(), Some(repo_path.as_path()), overrides) {
        Ok(config) => config,
        Err(e) => fail(&format!("Configuration error: {}", e)),
    }
}

fn host_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .map(|dir| dir.join("chart-values").join("config.toml"))
}

fn render_overrides(
    chart: Option<PathBuf>,
    release: Option<String>,
    namespace: Option<String>,
) -> Option<ConfigTree> {
    let mut overrides = serde_json::Map::new();
    if let Some(chart) = chart {
        overrides.insert("chart_dir".to_string(), chart.display().to_string().into());
    }
    if let Some(release) = release {
        overrides.insert("release".to_string(), release.into());
    }
    if let Some(namespace) = namespace {
        overrides.insert("namespace".to_string(), namespace.into());
    }

    if overrides.is_empty() {
        None
    } else {
        Some(ConfigTree::from(serde_json::Value::Object(overrides)))
    }
}

fn print_tree(tree: &ConfigTree, json: bool) {
    let out = if json {
        serde_json::to_string_pretty(tree).map_err(|e| e.to_string())
    } else {
        to_yaml_string(tree).map_err(|e| e.to_string())
    };

    match out {
        Ok(text) if json => println!("{}", text),
        Ok(text) => print!("{}", text),
        Err(e) => fail(&format!("Error serializing output: {}", e)),
    }
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    process::exit(1);
}
