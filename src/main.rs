use anyhow::Result;
use audio_pairing::utils::logging;
use audio_pairing::{Config, PairingEngine};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    // 解析命令行参数：音箱型号 + 功放型号
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("用法: {} <音箱型号> <功放型号>", args[0]);
        eprintln!("示例: {} \"KEF LS50 Meta\" \"Yamaha A-S501\"", args[0]);
        std::process::exit(2);
    }
    let speaker_name = &args[1];
    let amp_name = &args[2];

    // 组装并运行引擎
    let engine = PairingEngine::new(&config).await;

    let report = engine
        .generate_pairing(speaker_name, amp_name, serde_json::json!({}))
        .await?;

    let local_score = engine.compatibility_score(&report.speaker, &report.amplifier);
    info!(
        "📊 AI 兼容性分数: {:?} / 本地启发式分数: {}",
        report.compatibility_score(),
        local_score
    );

    println!("{}", serde_json::to_string_pretty(&report)?);

    let stats = engine.cache_stats().await;
    info!(
        "✅ 分析完成 (缓存条目: {}, 本次进程分析产品: {})",
        stats.cache_size, stats.products_cached
    );

    Ok(())
}
