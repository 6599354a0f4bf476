use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use smart_paste::cache::{compute_cache_key, ResultCache};
use smart_paste::cli::{self, Cli, Commands};
use smart_paste::config::Config;
use smart_paste::error::{PasteError, Result};
use smart_paste::workflow::{self, ParseOutput, SourceInput};
use smart_paste::{fetch, reader, report, review, scanner};
use smart_paste_common::{diff_specs, AliasStore, DiffSummary, SmartPaste, SourceKind};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load()?;

    match cli.command {
        Commands::Parse { input, url, html, catalog, category, imperial, single, use_cache, output } => {
            let catalog = workflow::load_catalog(&config, catalog.as_deref())?;
            let aliases = workflow::load_aliases(&config)?;

            let mut options = config.parse_options();
            options.category = category;
            if imperial {
                options.prefer_metric = false;
            }
            let engine = SmartPaste::new(&catalog, &aliases).with_options(options);

            // 入力の読み込み
            let (source, kind, label) = if let Some(url) = url {
                let proxy = config.get_proxy_url();
                let body = fetch::fetch_page(&url, proxy.as_deref(), config.fetch_timeout_seconds).await?;
                (SourceInput::plain(body), SourceKind::Url, url)
            } else {
                let mut source = match &input {
                    Some(path) => SourceInput::from(reader::read_source(path).await?),
                    None if html.is_some() => SourceInput::default(),
                    None => SourceInput::plain(reader::read_stdin().await?),
                };
                if let Some(html_path) = &html {
                    source.markup = Some(std::fs::read_to_string(html_path)?);
                }

                let kind = if input.is_some() { SourceKind::File } else { SourceKind::Paste };
                let label = input
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "stdin".to_string());
                (source, kind, label)
            };

            let parsed = if use_cache {
                parse_with_cache(&engine, &aliases, &source, kind, single, &label)?
            } else {
                workflow::parse_input(&engine, &source, kind, single)?
            };

            println!("{}", report::format_output(&parsed, &catalog));

            if let Some(output) = output {
                write_json(&output, &parsed)?;
                println!("✔ 結果を保存: {}", output.display());
            }
        }

        Commands::Scan { folder, recursive, catalog, output } => {
            println!("📂 smart-paste - 一括解析\n");

            let catalog = workflow::load_catalog(&config, catalog.as_deref())?;
            let aliases = workflow::load_aliases(&config)?;
            let engine = SmartPaste::new(&catalog, &aliases).with_options(config.parse_options());

            // 1. スキャン
            println!("[1/2] ファイルをスキャン中...");
            let files = scanner::scan_folder(&folder, recursive)?;
            println!("✔ {}件のファイルを検出\n", files.len());

            // 2. 読み込み・解析（解析は並列）
            println!("[2/2] 解析中...");
            let progress = ProgressBar::new(files.len() as u64);
            progress.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            let mut loaded = Vec::with_capacity(files.len());
            for file in &files {
                loaded.push((file, reader::read_source(&file.path).await));
            }

            let parsed: Vec<_> = loaded
                .into_par_iter()
                .map(|(file, source)| {
                    let parsed = source.and_then(|source| {
                        workflow::parse_input(&engine, &SourceInput::from(source), SourceKind::File, false)
                    });
                    progress.inc(1);
                    (file, parsed)
                })
                .collect();

            let mut results = serde_json::Map::new();
            let mut failures = 0usize;
            for (file, parsed) in parsed {
                match parsed {
                    Ok(parsed) => {
                        results.insert(file.path.display().to_string(), serde_json::to_value(&parsed)?);
                    }
                    Err(e) => {
                        failures += 1;
                        progress.println(format!("⚠ {}: {}", file.file_name, e));
                    }
                }
            }
            progress.finish_and_clear();
            println!("✔ 解析完了（成功 {}件 / 失敗 {}件）\n", results.len(), failures);

            let output = output.unwrap_or_else(|| folder.join("smart-paste.json"));
            write_json(&output, &results)?;
            println!("✔ 結果を保存: {}", output.display());
        }

        Commands::Diff { existing, input, catalog, category } => {
            let catalog = workflow::load_catalog(&config, catalog.as_deref())?;
            let aliases = workflow::load_aliases(&config)?;
            let mut options = config.parse_options();
            options.category = category;
            let engine = SmartPaste::new(&catalog, &aliases).with_options(options);

            let existing_specs = load_existing_specs(&existing)?;

            let source = SourceInput::from(reader::read_source(&input).await?);
            let parsed = workflow::parse_input(&engine, &source, SourceKind::File, true)?;
            let ParseOutput::Single(result) = parsed else {
                return Err(PasteError::Config("差分は単一製品の入力のみ対応しています".into()));
            };

            let entries = diff_specs(&existing_specs, &result.fields);
            print!("{}", report::format_diff(&entries));
            if !DiffSummary::from_entries(&entries).has_changes() {
                println!("✔ 差分はありません");
            }
        }

        Commands::Review { input, output } => {
            println!("📝 smart-paste - 抽出結果の確認\n");

            let catalog = workflow::load_catalog(&config, None)?;
            let mut aliases = workflow::load_aliases(&config)?;
            let before = aliases.clone();

            review::run_interactive_review(&input, output.as_deref(), &catalog, &mut aliases)?;

            if aliases != before {
                workflow::save_aliases(&config, &aliases)?;
                println!("✔ エイリアスを記録しました（{}件）", aliases.len());
            }
        }

        Commands::Alias { set, preset, list, clear } => {
            let mut aliases = workflow::load_aliases(&config)?;
            let mut changed = false;

            if clear {
                aliases.clear();
                changed = true;
                println!("✔ エイリアスを削除しました");
            }

            if let Some(name) = preset {
                let loaded = AliasStore::from_preset(&name)
                    .ok_or_else(|| PasteError::Config(format!("不明なプリセット: {}", name)))?;
                aliases.merge(&loaded);
                changed = true;
                println!("✔ プリセットを取り込みました: {}", name);
            }

            if let Some(assignment) = set {
                let (key, field) = cli::parse_alias_assignment(&assignment)
                    .ok_or_else(|| PasteError::Config(format!("KEY=FIELD の形式で指定してください: {}", assignment)))?;
                if aliases.record_alias(&key, &field) {
                    changed = true;
                    println!("✔ {} → {}", key, field);
                }
            }

            if changed {
                workflow::save_aliases(&config, &aliases)?;
            }

            if list || !changed {
                println!("エイリアス（{}件）:", aliases.len());
                for record in aliases.records() {
                    println!(
                        "  {} → {}  ({})",
                        record.source_key,
                        record.spec_name,
                        record.confirmed_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        Commands::Config { set_proxy, prefer_metric, show } => {
            let mut config = config;

            if let Some(url) = set_proxy {
                config.set_proxy_url(url)?;
                println!("✔ プロキシを設定しました");
            }

            if let Some(prefer_metric) = prefer_metric {
                config.set_prefer_metric(prefer_metric)?;
                println!("✔ 単位系を設定しました");
            }

            if show {
                println!("設定:");
                println!("  単位系: {}", if config.prefer_metric { "メートル法" } else { "ヤード・ポンド法" });
                println!("  プロキシ: {}", config.get_proxy_url().unwrap_or_else(|| "未設定".into()));
                println!("  取得タイムアウト: {}秒", config.fetch_timeout_seconds);
                println!(
                    "  カタログ: {}",
                    config
                        .catalog_path
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| format!("組み込み ({})", workflow::DEFAULT_CATALOG_PRESET))
                );
                println!("  エイリアス: {}", config.session_path()?.display());
                println!("  あいまい一致の下限: {}", config.fuzzy_min_overlap);
            }
        }

        Commands::Cache { clear, info } => {
            let cache_path = ResultCache::default_path()?;

            if info || !clear {
                // デフォルトまたは--info: 情報表示
                if cache_path.exists() {
                    let cache = ResultCache::load(&cache_path);
                    println!("キャッシュ情報:");
                    println!("  パス: {}", cache_path.display());
                    println!("  件数: {}", cache.len());
                    if let Ok(meta) = std::fs::metadata(&cache_path) {
                        println!("  サイズ: {} bytes", meta.len());
                    }
                } else {
                    println!("キャッシュファイルが存在しません: {}", cache_path.display());
                }
            }

            if clear {
                match ResultCache::clear(&cache_path) {
                    Ok(true) => println!("✔ キャッシュを削除しました: {}", cache_path.display()),
                    Ok(false) => println!("キャッシュファイルが存在しません"),
                    Err(e) => println!("キャッシュ削除エラー: {}", e),
                }
            }
        }
    }

    Ok(())
}

/// キャッシュを使って解析（同じ入力・カタログ・エイリアス・オプションならキャッシュを返す）
fn parse_with_cache(
    engine: &SmartPaste<'_>,
    aliases: &AliasStore,
    source: &SourceInput,
    kind: SourceKind,
    single: bool,
    label: &str,
) -> Result<ParseOutput> {
    let cache_path = ResultCache::default_path()?;
    let mut cache = ResultCache::load(&cache_path);

    let text = source.normalize(kind)?.lines.join("\n");
    let catalog_json = engine.catalog().to_json()?;
    let aliases_json = aliases.to_json()?;
    let options_json = serde_json::to_string(engine.options())?;
    let kind_json = serde_json::to_string(&kind)?;
    let key = compute_cache_key(&[
        text.as_str(),
        catalog_json.as_str(),
        aliases_json.as_str(),
        options_json.as_str(),
        kind_json.as_str(),
        if single { "single" } else { "batch" },
    ]);

    if let Some(cached) = cache.get(&key) {
        tracing::info!(source = label, "キャッシュを使用");
        return Ok(cached.clone());
    }

    let parsed = workflow::parse_input(engine, source, kind, single)?;
    cache.insert(key, label.to_string(), parsed.clone());
    cache.save(&cache_path)?;
    Ok(parsed)
}

/// 既存スペックJSON（{"項目名": "値"}）を記載順で読み込み
fn load_existing_specs(path: &Path) -> Result<Vec<(String, String)>> {
    if !path.exists() {
        return Err(PasteError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;

    // 登録用ペイロード形式なら specs を使う
    let specs = value.get("specs").unwrap_or(&value);
    let object = specs
        .as_object()
        .ok_or_else(|| PasteError::Config(format!("既存スペックはJSONオブジェクトで指定してください: {}", path.display())))?;

    Ok(object
        .iter()
        .map(|(name, value)| {
            let text = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            (name.clone(), text)
        })
        .collect())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
