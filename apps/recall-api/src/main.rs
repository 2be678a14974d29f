use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	recall_api::run(recall_api::Args::parse()).await
}
