use clap::{Parser, Subcommand};
use dotenv::dotenv;
use stepflow_rs::adk::agent::{Agent, ToolCallingAgent};
use stepflow_rs::adk::error::{StepflowError, WorkflowError};
use stepflow_rs::adk::model::ollama::OllamaChatModel;
use stepflow_rs::adk::model::Model;
use stepflow_rs::stepflow::tools::DuckDuckGoSearchTool;
use stepflow_rs::stepflow::workflow::{
    web_search_workflow, Builder, OllamaProvider, ToolRegistry, WebSearchState,
};

use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a single prompt to a tool-calling agent
    Chat {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// Ollama model; defaults to OLLAMA_MODEL
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Answer a question with the web search workflow
    Search {
        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        model: Option<String>,

        /// Search results passed to the model
        #[arg(long, default_value_t = 5)]
        max_results: usize,
    },
    /// Run a workflow from a YAML file
    Run {
        /// Path to the workflow file
        #[arg(short, long)]
        file: String,

        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        state: String,
    },
}

fn ollama(model: Option<String>) -> Arc<dyn Model> {
    match model {
        Some(name) => Arc::new(OllamaChatModel::new(name)),
        None => Arc::new(OllamaChatModel::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Chat { prompt, model } => {
            let registry = ToolRegistry::with_builtin_tools().await;
            let tools = registry.resolve(&registry.names().await).await?;
            let agent = ToolCallingAgent::new("assistant", ollama(model), tools)
                .with_instructions("You are a helpful assistant.");

            log::info!("Sending prompt to {}", agent.meta().name);
            let output = agent.run(&prompt).await?;
            println!("{}", output.text);
        }
        Commands::Search {
            question,
            model,
            max_results,
        } => {
            let search = Arc::new(DuckDuckGoSearchTool::new(max_results));
            let workflow = web_search_workflow(ollama(model), search)?;

            let result = workflow.run(WebSearchState::new(question)).await?;
            println!("{}", result.state.output.unwrap_or_default());
        }
        Commands::Run { file, state } => {
            let registry = ToolRegistry::with_builtin_tools().await;
            let builder = Builder::new(registry, Arc::new(OllamaProvider));
            let workflow = builder.build_file(&file).await?;

            println!("Running workflow: {}", workflow.name);
            let initial: serde_json::Value = serde_json::from_str(&state)
                .map_err(|e| StepflowError::config(format!("--state is not valid JSON: {}", e)))?;
            let initial = workflow
                .initial_state(initial)
                .map_err(WorkflowError::from)?;

            let (steps, state, error) = match workflow.run(initial).await {
                Ok(result) => (result.steps, result.state, None),
                Err(failed) => (failed.steps, failed.state, Some(failed.error)),
            };
            for record in &steps {
                log::info!(
                    "{} -> {:?} ({} ms)",
                    record.step,
                    record.transition,
                    record.elapsed_ms
                );
            }
            if error.is_some() {
                println!("Workflow failed; state at the point of failure:");
            }
            println!("{}", serde_json::to_string_pretty(&state.to_json())?);
            if let Some(error) = error {
                return Err(StepflowError::Workflow(error).into());
            }
        }
    }

    Ok(())
}
