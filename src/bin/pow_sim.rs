//! Key-search PoW simulator
//! Deploys an in-memory contract and token, then mines rounds locally

use clap::Parser;
use keysearch_pow::{
    Address, BlockProducer, InMemoryToken, Miner, MinerConfig, MiningParams, MiningService,
    PoWConfig, PowContract, SubmissionStatus, U256,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pow_sim")]
#[command(about = "Mine rounds of the key-search PoW against an in-memory contract")]
struct Args {
    /// Rounds to mine
    #[arg(short, long, default_value = "10")]
    rounds: u64,

    /// Search threads
    #[arg(short, long)]
    threads: Option<usize>,

    /// JSON file with a PoWConfig; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reward per solution in whole tokens (18 decimals)
    #[arg(long, default_value = "1")]
    reward: u64,

    /// Solutions per retarget window
    #[arg(long, default_value = "1")]
    retarget_interval: u64,

    /// Per-step retarget bound numerator
    #[arg(long, default_value = "10")]
    step_numerator: u64,

    /// Per-step retarget bound denominator
    #[arg(long, default_value = "9")]
    step_denominator: u64,

    /// Simulated seconds per block
    #[arg(long, default_value = "12")]
    block_time: u64,

    /// Tokens minted to the contract
    #[arg(long, default_value = "1000")]
    funding: u64,

    /// Payload bound into each claim
    #[arg(long, default_value = "pow_sim")]
    data: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => serde_json::from_str::<PoWConfig>(&std::fs::read_to_string(path)?)?,
        None => PoWConfig::default(),
    };
    config.validate()?;

    let unit = U256::exp10(18);
    let contract_address = Address::repeat_byte(0xc0);
    let owner = Address::repeat_byte(0xaa);
    let beneficiary = Address::repeat_byte(0xbe);

    info!("Configuration:");
    info!("  Rounds: {}", args.rounds);
    info!("  Initial difficulty: {}", config.initial_difficulty);
    info!("  Target solve time: {}s", config.target_solve_time_secs);
    info!(
        "  Retarget: every {} solutions, step {}/{}",
        args.retarget_interval, args.step_numerator, args.step_denominator
    );

    let mut token = InMemoryToken::new("POW");
    token.mint(&contract_address, unit * U256::from(args.funding))?;
    let contract = PowContract::new(contract_address, token, config)?;
    let service = MiningService::new(contract, BlockProducer::simulated(1, 1_700_000_000, args.block_time));

    service.execute(owner, |c, ctx| c.initialize(ctx, owner)).await?;
    service.execute(owner, |c, ctx| c.initialize2(ctx)).await?;
    let params = MiningParams::new(
        unit * U256::from(args.reward),
        args.retarget_interval,
        args.step_numerator,
        args.step_denominator,
    );
    service.execute(owner, |c, ctx| c.set_mining_params(ctx, params)).await?;
    service.execute(owner, |c, ctx| c.start_mining(ctx)).await?;

    let miner_config = match args.threads {
        Some(threads) => MinerConfig::new(threads),
        None => MinerConfig::default(),
    };
    let miner = Miner::new(miner_config);
    let data = args.data.into_bytes();

    for _ in 0..args.rounds {
        let work = service.current_work().await?;
        miner.set_work(work.clone()).await;

        let Some(solution) = miner.mine_work(work, beneficiary, data.clone()).await? else {
            warn!("Search abandoned");
            continue;
        };

        let result = service.submit(beneficiary, solution.into_submission()).await;
        match (result.status, result.receipt) {
            (SubmissionStatus::Accepted, Some(receipt)) => info!(
                "Round {} paid {} to {}; next difficulty {}",
                receipt.round, receipt.reward, receipt.beneficiary, receipt.next_difficulty
            ),
            (_, _) => warn!("Submission rejected: {}", result.error.unwrap_or_default()),
        }
    }

    let summary = serde_json::json!({
        "service": service.stats().await?,
        "miner": miner.get_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
