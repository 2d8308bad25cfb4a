use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use audience_rs::config::Settings;
use audience_rs::dataset::RowSource;
use audience_rs::engine::{evaluate, EvalMode, EvalResult};
use audience_rs::formula::serialize;
use audience_rs::loader::Loader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a formula against a dataset schema and show its forms
    Check {
        /// Path to the formula document (JSON or YAML)
        #[arg(short, long)]
        formula: String,

        /// Path to the dataset fixture
        #[arg(short, long)]
        dataset: String,
    },
    /// Count (and optionally list) the rows a formula selects
    Select {
        #[arg(short, long)]
        formula: Option<String>,

        #[arg(short, long)]
        dataset: String,

        /// Print the selected rows as JSON lines
        #[arg(long)]
        rows: bool,
    },
    /// Load a workflow, save its filters and conditions, and report counters
    Workflow {
        /// Path to the workflow definition (YAML)
        #[arg(short, long)]
        file: String,

        #[arg(short, long)]
        dataset: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let settings = Settings::from_env()?;
    let loader = Loader::new();

    match args.command {
        Commands::Check { formula, dataset } => {
            let node = loader
                .load_formula(&formula)
                .with_context(|| format!("reading formula {}", formula))?;
            let fixture = loader
                .load_dataset(&dataset)
                .with_context(|| format!("reading dataset {}", dataset))?;

            println!("{}", serde_json::to_string_pretty(&serialize(&node))?);
            for mode in [EvalMode::Text, EvalMode::Variables, EvalMode::Predicate] {
                match evaluate(&node, mode, &fixture.schema)? {
                    EvalResult::Text(text) => println!("text: {}", text),
                    EvalResult::Variables(columns) => {
                        let columns: Vec<_> = columns.into_iter().collect();
                        println!("columns: {}", columns.join(", "));
                    }
                    EvalResult::Predicate(predicate) => {
                        println!("sql: {}", predicate.sql);
                        println!("params: {:?}", predicate.params);
                    }
                    EvalResult::RowMask(_) => {}
                }
            }
        }
        Commands::Select {
            formula,
            dataset,
            rows,
        } => {
            let node = formula
                .as_deref()
                .map(|path| loader.load_formula(path))
                .transpose()?;
            let fixture = loader.load_dataset(&dataset)?;

            log::info!("Using {:?} backend", settings.backend);
            let source = settings.open_source(fixture).await?;

            let count = source.count_selected(node.as_ref()).await?;
            println!("{} rows selected", count);
            if rows {
                for row in source.select_rows(node.as_ref()).await? {
                    println!("{}", row.to_json());
                }
            }
        }
        Commands::Workflow { file, dataset } => {
            let definition = loader
                .load_workflow(&file)
                .with_context(|| format!("reading workflow {}", file))?;
            let fixture = loader.load_dataset(&dataset)?;
            let source = settings.open_source(fixture).await?;

            let mut workflow = definition.build(source.as_ref()).await?;
            let ids: Vec<_> = workflow.actions().iter().map(|a| a.id).collect();

            println!("Workflow: {}", workflow.name);
            for id in ids {
                let Some(action) = workflow.action_mut(id) else {
                    continue;
                };
                let all_false = action.rows_all_false(source.as_ref()).await?;

                println!("Action: {}", action.name);
                if let Some(filter) = action.filter() {
                    println!("  filter: {} rows | {}", filter.n_rows_selected, filter.text_description);
                }
                for condition in action.conditions() {
                    println!(
                        "  {}: {} rows | {}",
                        condition.name, condition.n_rows_selected, condition.text_description
                    );
                }
                println!("  rows_all_false: {}", all_false);
            }
        }
    }

    Ok(())
}
