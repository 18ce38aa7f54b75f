use aiko_gen::{
    CharacterAppearance, GenerationClient, GenerationConfig, GenerationParams, ImageParams,
    JobKind, WaitOptions,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(name) = args.next() else {
        anyhow::bail!("usage: aiko-generate <name> <appearance text...>");
    };
    let custom = args.collect::<Vec<_>>().join(" ");
    if custom.trim().is_empty() {
        anyhow::bail!("usage: aiko-generate <name> <appearance text...>");
    }

    let config = GenerationConfig::from_env()?;
    let client = GenerationClient::new(config);

    let appearance = CharacterAppearance {
        custom: Some(custom),
        ..Default::default()
    };
    let params = GenerationParams::Image(ImageParams::new(name, appearance));

    let receipt = client.submit(&params).await?;
    tracing::info!(prompt_id = %receipt.prompt_id, seed = receipt.seed, "job submitted");

    if let Ok(Some(entry)) = client.queue_position(&receipt.prompt_id).await {
        tracing::info!(position = entry.queue_position, "job queued");
    }

    let media = client
        .wait_for_completion(&receipt.prompt_id, JobKind::Image, WaitOptions::default())
        .await?;
    println!("{}", media.media_url);
    Ok(())
}
