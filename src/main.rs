use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use photo_restore_common::{
    ApiKeySource, BatchOutcome, BulkOrchestrator, InMemoryPreviews, RetryOutcome, StaticApiKey,
    TaskEvent, TaskId, TaskStatus,
};
use photo_restore_rust::{cli, client, config, download, error, logging, scanner, server};
use cli::{Cli, Commands};
use config::{Config, KeyStore};
use error::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let config = Config::load()?;

    match cli.command {
        Commands::Restore { inputs, output, recursive, endpoint, api_key, retry_failed } => {
            println!("🖼  photo-restore - 一括修復\n");

            // 1. 読み込み
            println!("[1/3] 写真を読み込み中...");
            let images = scanner::scan_inputs(&inputs, recursive)?;
            if images.is_empty() {
                let joined: Vec<String> = inputs.iter().map(|p| p.display().to_string()).collect();
                return Err(error::PhotoRestoreError::NoImagesFound(joined.join(", ")));
            }
            let sources = images
                .iter()
                .map(scanner::load_source)
                .collect::<Result<Vec<_>>>()?;
            println!("✔ {}枚の写真を検出\n", sources.len());

            let keys: Arc<dyn ApiKeySource> = match api_key {
                Some(key) => Arc::new(StaticApiKey(Some(key))),
                None => Arc::new(KeyStore::open_default()?),
            };
            let endpoint = endpoint.unwrap_or_else(|| config.endpoint());
            let restorer = client::HttpRestoreClient::new(
                endpoint.clone(),
                keys,
                config.retry_policy(),
                config.timeout(),
            )?;
            let orchestrator =
                BulkOrchestrator::new(Arc::new(restorer), Arc::new(InMemoryPreviews::new()));

            let names: HashMap<TaskId, String> = {
                let file_names: Vec<String> = sources.iter().map(|s| s.file_name.clone()).collect();
                orchestrator.enqueue(sources).into_iter().zip(file_names).collect()
            };

            // 2. 修復
            println!("[2/3] AI修復中...（{}件 → {}）", orchestrator.len(), endpoint);
            let bar = ProgressBar::new(names.len() as u64);
            bar.set_style(
                ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            orchestrator.set_listener(progress_listener(bar.clone(), names.clone()));

            if let BatchOutcome::Finished(summary) = orchestrator.run_batch().await {
                bar.finish_and_clear();
                println!(
                    "✔ 修復完了: 成功 {} / 失敗 {}\n",
                    summary.succeeded, summary.failed
                );
            }

            if retry_failed {
                let failed: Vec<TaskId> = orchestrator
                    .tasks()
                    .iter()
                    .filter(|t| t.status() == TaskStatus::Error)
                    .map(|t| t.id())
                    .collect();
                if !failed.is_empty() {
                    orchestrator.set_listener(Arc::new(|_: &TaskEvent| {}));
                    println!("- 失敗した{}件を再試行中...", failed.len());
                    for id in failed {
                        let name = names.get(&id).map(String::as_str).unwrap_or("?");
                        match orchestrator.retry(id).await {
                            RetryOutcome::Done => println!("  ✔ {}", name),
                            RetryOutcome::Failed => println!("  ✗ {}", name),
                            _ => {}
                        }
                    }
                    println!();
                }
            }

            // 3. 保存
            println!("[3/3] 修復画像を保存中...");
            let output_dir = output.unwrap_or_else(|| PathBuf::from("."));
            let report = download::download_all_finished(&orchestrator, &output_dir)?;
            for path in &report.saved {
                println!("  {}", path.display());
            }
            for failure in &report.failed {
                println!("  ✗ {}: {}", failure.file_name, failure.reason);
            }
            println!("✔ {}枚を保存: {}", report.saved.len(), output_dir.display());

            let view = orchestrator.view();
            if view.counts.error > 0 {
                println!("\n失敗した写真:");
                for card in view.cards.iter().filter(|c| c.status == TaskStatus::Error) {
                    println!(
                        "  ✗ {}: {}",
                        card.file_name,
                        card.error_detail.as_deref().unwrap_or("不明なエラー")
                    );
                }
            }

            println!(
                "\n✅ 完了（成功 {} / 失敗 {} / 合計 {}）",
                view.counts.done,
                view.counts.error,
                view.total()
            );
        }

        Commands::Serve { addr, model } => {
            println!("🛰  photo-restore - 修復エンドポイント\n");
            let mut config = config;
            if let Some(model) = model {
                config.model = model;
            }
            let addr = addr.unwrap_or_else(|| config.listen_addr.clone());
            let state = server::AppState::from_config(&config)?;

            println!("  モデル: {}", config.model);
            println!(
                "  サーバー側APIキー: {}",
                if state.server_api_key.is_some() { "設定済み" } else { "未設定（リクエストのキーのみ使用）" }
            );
            println!("✔ http://{}{} で待ち受け中（Ctrl+C で終了）", addr, server::RESTORE_PATH);

            server::serve(&addr, state).await?;
        }

        Commands::Config { set_api_key, prompt_api_key, clear_api_key, set_endpoint, show } => {
            let store = KeyStore::open_default()?;

            if let Some(key) = set_api_key {
                store.save(&key)?;
                println!("✔ APIキーを設定しました");
            }

            if prompt_api_key {
                let key: String = dialoguer::Password::new()
                    .with_prompt("Gemini APIキー")
                    .allow_empty_password(true)
                    .interact()
                    .map_err(|e| error::PhotoRestoreError::Config(e.to_string()))?;
                store.save(&key)?;
                if key.trim().is_empty() {
                    println!("✔ APIキーを削除しました");
                } else {
                    println!("✔ APIキーを設定しました");
                }
            }

            if clear_api_key {
                store.clear()?;
                println!("✔ APIキーを削除しました");
            }

            if let Some(endpoint) = set_endpoint {
                let mut config = Config::load()?;
                config.endpoint = endpoint.trim().to_string();
                config.save()?;
                println!("✔ エンドポイントを設定しました");
            }

            if show {
                let config = Config::load()?;
                println!("設定:");
                println!("  設定ファイル: {}", store.path().display());
                println!("  エンドポイント: {}", config.endpoint());
                println!("  待ち受けアドレス: {}", config.listen_addr);
                println!("  モデル: {}", config.model);
                println!("  最大試行回数: {}", config.max_attempts);
                println!("  初回待機: {}ms", config.base_delay_ms);
                println!("  APIキー: {}", if store.current_api_key().is_some() { "設定済み" } else { "未設定" });
                println!(
                    "  サーバー側APIキー: {}",
                    if config.server_api_key().is_some() { "設定済み" } else { "未設定" }
                );
            }
        }
    }

    Ok(())
}

/// 一括処理の進捗をプログレスバーに反映
fn progress_listener(
    bar: ProgressBar,
    names: HashMap<TaskId, String>,
) -> photo_restore_common::TaskListener {
    Arc::new(move |event: &TaskEvent| match event {
        TaskEvent::Processing(id) => {
            if let Some(name) = names.get(id) {
                bar.set_message(name.clone());
            }
        }
        TaskEvent::Done(_) | TaskEvent::Discarded(_) => bar.inc(1),
        TaskEvent::Failed { id, detail } => {
            let name = names.get(id).map(String::as_str).unwrap_or("?");
            bar.println(format!("  ✗ {}: {}", name, detail));
            bar.inc(1);
        }
        _ => {}
    })
}
