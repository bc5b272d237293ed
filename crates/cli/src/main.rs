//! Sysl view command line.
//!
//! Encodes and decodes view keys, and runs a command plugin once the way the
//! editor would.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sysl_model::{ViewKey, ViewKeyError};
use sysl_plugin::protocol::{Action, Change, OnChangeResponse, Source};
use sysl_plugin::{CommandClient, PluginConfig, Request, Response};
use sysl_worker::Executor;
use tracing::info;
use url::Url;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "sysl-view")]
#[command(about = "Sysl view keys and command plugins")]
struct Args {
	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the URI form of a view key
	Encode {
		/// Location of the document the view represents
		#[arg(long, default_value = "")]
		doc_uri: String,
		/// Plugin owning the view
		#[arg(long, default_value = "")]
		plugin_id: String,
		/// View id within the plugin
		#[arg(long, default_value = "")]
		view_id: String,
	},
	/// Print a view key URI as JSON
	Decode {
		/// View key URI; an empty string is the empty URI
		uri: String,
	},
	/// Call a command plugin once and print its response
	Call {
		/// Plugin descriptor (TOML)
		#[arg(short, long, value_name = "PATH")]
		config: PathBuf,
		/// Sysl file to send in an onchange request; sends initialize when omitted
		#[arg(long, value_name = "FILE")]
		onchange: Option<PathBuf>,
	},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	match args.command {
		Command::Encode {
			doc_uri,
			plugin_id,
			view_id,
		} => {
			println!("{}", ViewKey::new(doc_uri, plugin_id, view_id).to_uri_string()?);
		}
		Command::Decode { uri } => {
			let key: ViewKey = uri.parse()?;
			println!("{}", serde_json::to_string_pretty(&key)?);
		}
		Command::Call { config, onchange } => call(&config, onchange.as_deref()).await?,
	}

	Ok(())
}

async fn call(config: &Path, onchange: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
	let config = PluginConfig::load(config)?;
	let executor = Executor::new();
	let client = CommandClient::from_config(&config, executor.clone())?;

	let (request, doc_uri) = match onchange {
		None => (Request::initialize(), None),
		Some(path) => {
			let path = std::fs::canonicalize(path)?;
			let content = std::fs::read_to_string(&path)?;
			let doc_uri = Url::from_file_path(&path).map_err(|()| format!("cannot express {} as a URI", path.display()))?;
			let file_path = path.display().to_string();
			let change = Change {
				action: Some(Action::SaveFile),
				source: Some(Source::Text),
				file_path: Some(file_path.clone()),
				detail: None,
			};
			let context = client.context(file_path, content);
			(Request::on_change(change, context), Some(doc_uri))
		}
	};

	let response = client.call(&request).await?;
	println!("{}", serde_json::to_string_pretty(&response)?);

	if let (Response::OnChange(res), Some(doc_uri)) = (&response, &doc_uri) {
		for view in rendered_views(&client, doc_uri, res)? {
			println!("{view}");
			info!(view = %view, "rendered view");
		}
	}

	executor.all_settled().await;
	info!(snapshot = ?executor.snapshot(), "plugin work settled");
	Ok(())
}

/// Returns the view key URI of each diagram in `res`, in display order.
fn rendered_views(client: &CommandClient, doc_uri: &Url, res: &OnChangeResponse) -> Result<Vec<String>, ViewKeyError> {
	client
		.view_keys(doc_uri.as_str(), res)
		.into_iter()
		.map(|(key, _)| key.to_uri_string())
		.collect()
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	// stdout carries command output, so logs go to stderr.
	let filter = EnvFilter::try_from_env("SYSL_LOG").unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("sysl_view=debug,sysl_plugin=debug,sysl_worker=trace,info")
		} else {
			EnvFilter::new("sysl_view=info,sysl_plugin=info,warn")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

#[cfg(test)]
mod tests {
	use sysl_plugin::protocol::{Diagram, DiagramDescriptor};
	use sysl_plugin::{ClientOptions, RunOptions};

	use super::*;

	#[test]
	fn rendered_views_address_each_diagram() {
		let client = CommandClient::new("erd", RunOptions::new("true", Vec::<String>::new()), ClientOptions::default(), Executor::new());
		let res = OnChangeResponse {
			render_diagram: vec![
				Diagram {
					kind: Some(DiagramDescriptor {
						id: Some("entities".into()),
						..DiagramDescriptor::default()
					}),
					content: None,
				},
				Diagram::default(),
			],
		};
		let doc_uri = Url::parse("file:///ws/a.sysl").unwrap();

		let views = rendered_views(&client, &doc_uri, &res).unwrap();
		assert_eq!(
			views,
			[
				"view+file:/ws/a.sysl?pluginId=erd&viewId=entities",
				"view+file:/ws/a.sysl?pluginId=erd&viewId=erd",
			]
		);
	}
}
