//! 无 UI 的命令行交互：语言选择、标题搜索、章节列表、选择、下载与汇总。

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::strings::{LANGUAGES, Language, Strings, fill};
use crate::base_system::context::Config;
use crate::download::downloader::BatchDownloader;
use crate::download::models::{Chapter, ChapterOutcome, DownloadResult};
use crate::download::plan::{CatalogOptions, EnumerationError, prepare_download_plan, prepare_work_dir};
use crate::download::progress::{DownloadEvent, ProgressReporter};
use crate::download::search::{ResolutionError, SearchOptions, resolve_title};
use crate::download::selection::select_chapters;
use crate::network_parser::network::MangaDexClient;

/// 列表超过该数量时只显示首尾各 `LIST_EDGE` 章。
const LIST_COLLAPSE_AT: usize = 20;
const LIST_EDGE: usize = 10;

/// 命令行传入的一次性参数；`title` 存在时只运行一轮。
#[derive(Debug, Default, Clone)]
pub struct RunArgs {
    pub title: Option<String>,
    pub language: Option<String>,
    pub chapters: Option<String>,
}

pub fn run(config: &mut Config, client: Arc<MangaDexClient>, args: RunArgs) -> Result<()> {
    let Some(language) = pick_language(config, args.language.as_deref())? else {
        return Ok(());
    };
    let text = language.strings();
    config.language = language.code().to_string();
    println!("{}", fill(text.selected_language, &[&language.name()]));
    info!(target: "ui", language = language.code(), "界面语言已选择");

    let downloader = BatchDownloader::from_config(config, client.clone(), client.clone())
        .context("启动下载工作池失败")?;
    let session = Session {
        search: SearchOptions::from(&*config),
        catalog: CatalogOptions::from(&*config),
        config,
        client: client.as_ref(),
        downloader: &downloader,
        text,
    };
    let one_shot = args.title.is_some();
    let mut pending_title = args.title;

    loop {
        let title = match pending_title.take() {
            Some(t) => t,
            None => match read_line(text.title_prompt)? {
                Some(t) => t,
                None => break,
            },
        };
        let title = title.trim();
        if title.is_empty() {
            println!("{}", text.title_empty);
            if one_shot {
                break;
            }
            continue;
        }

        if let Some(result) = session.download_title(title, args.chapters.as_deref())? {
            print_summary(text, &result);
        }

        if one_shot || !ask_continue(text)? {
            break;
        }
    }

    println!("{}", text.finished);
    Ok(())
}

struct Session<'a> {
    config: &'a Config,
    client: &'a MangaDexClient,
    downloader: &'a BatchDownloader,
    text: &'static Strings,
    search: SearchOptions,
    catalog: CatalogOptions,
}

impl Session<'_> {
    /// 一轮完整流程；返回 `None` 表示在下载前就结束了（未找到、无章节、无选择等）。
    fn download_title(&self, title: &str, preset: Option<&str>) -> Result<Option<DownloadResult>> {
        let (config, text) = (self.config, self.text);
        let resolved = match resolve_title(self.client, title, self.search) {
            Ok(r) => r,
            Err(ResolutionError::NotFound { title }) => {
                println!("{}", fill(text.work_not_found, &[&title]));
                return Ok(None);
            }
            Err(ResolutionError::Ambiguous { title, suggestions }) => {
                println!("{}", fill(text.no_confident_match, &[&title]));
                for s in &suggestions {
                    println!("{}", fill(text.suggestion, &[&s.title, &s.score]));
                }
                return Ok(None);
            }
        };
        println!(
            "{}",
            fill(text.work_found, &[&resolved.work.display_title, &resolved.score])
        );

        println!("{}", fill(text.fetching_chapters, &[&config.language]));
        let plan = match prepare_download_plan(
            self.client,
            resolved.work,
            &config.language,
            &self.catalog,
        ) {
            Ok(p) => p,
            Err(e) => {
                let reason = match &e {
                    EnumerationError::Transport(inner) => inner.to_string(),
                    EnumerationError::Unexpected(msg) => msg.clone(),
                };
                println!("{}", fill(text.chapters_failed, &[&reason]));
                return Ok(None);
            }
        };
        let (work, chapters) = (plan.work, plan.chapters);
        if chapters.is_empty() {
            println!("{}", fill(text.no_chapters, &[&config.language]));
            return Ok(None);
        }
        print_chapter_list(text, &chapters);

        let Some(selected) = choose_chapters(text, &chapters, preset)? else {
            return Ok(None);
        };

        let work_dir = match prepare_work_dir(&config.default_save_dir(), &work) {
            Ok(dir) => dir,
            Err(e) => {
                println!("{}", fill(text.work_dir_failed, &[&e]));
                return Ok(None);
            }
        };

        println!(
            "{}",
            fill(
                text.download_notice,
                &[&config.max_workers.max(1), &config.chapter_delay().as_secs_f32()]
            )
        );
        let mut reporter = ProgressReporter::with_callback(Box::new(
            move |evt: &DownloadEvent| render_event(text, evt),
        ))
        .with_cli_bars(text.bar_chapters, text.bar_images);
        let result = self.downloader.run(&selected, &work_dir, &mut reporter);
        reporter.finish_cli_bars();
        Ok(Some(result))
    }
}

fn print_chapter_list(text: &Strings, chapters: &[Chapter]) {
    println!("{}", fill(text.available_chapters, &[&chapters.len()]));
    let item = |c: &Chapter| println!("{}", fill(text.chapter_item, &[&c.display_label]));
    if chapters.len() > LIST_COLLAPSE_AT {
        chapters[..LIST_EDGE].iter().for_each(item);
        println!(
            "{}",
            fill(text.more_chapters, &[&(chapters.len() - 2 * LIST_EDGE)])
        );
        chapters[chapters.len() - LIST_EDGE..].iter().for_each(item);
    } else {
        chapters.iter().for_each(item);
    }
}

/// 交互模式下反复询问直到得到非空结果；使用命令行预设时只尝试一次。
fn choose_chapters(
    text: &Strings,
    chapters: &[Chapter],
    preset: Option<&str>,
) -> Result<Option<Vec<Chapter>>> {
    let mut preset = preset.map(str::to_string);
    let interactive = preset.is_none();

    loop {
        let expr = match preset.take() {
            Some(e) => e,
            None => match read_line(text.selection_prompt)? {
                Some(e) => e,
                None => return Ok(None),
            },
        };
        if expr.trim().is_empty() {
            println!("{}", text.selection_empty);
            if interactive {
                continue;
            }
            return Ok(None);
        }

        let selection = select_chapters(chapters, &expr);
        let diag = &selection.diagnostics;
        if !diag.invalid_ranges.is_empty() {
            println!("{}", fill(text.invalid_ranges, &[&diag.invalid_ranges.join(", ")]));
        }
        if !diag.empty_ranges.is_empty() {
            println!("{}", fill(text.empty_ranges, &[&diag.empty_ranges.join(", ")]));
        }
        if !diag.not_found.is_empty() {
            println!("{}", fill(text.chapters_not_found, &[&diag.not_found.join(", ")]));
        }
        if !diag.invalid.is_empty() {
            println!("{}", fill(text.invalid_inputs, &[&diag.invalid.join(", ")]));
        }

        match selection.into_result() {
            Ok(selected) => return Ok(Some(selected)),
            Err(e) => {
                warn!(target: "ui", expr = %expr.trim(), error = %e, "章节选择无效");
                println!("{}", text.nothing_selected);
                if !interactive {
                    return Ok(None);
                }
            }
        }
    }
}

fn render_event(text: &Strings, event: &DownloadEvent) -> Option<String> {
    match event {
        DownloadEvent::ChapterStarted {
            index,
            total,
            label,
            ..
        } => Some(fill(text.chapter_started, &[index, total, label])),
        DownloadEvent::ChapterFinished { label, outcome, .. } => Some(match outcome {
            ChapterOutcome::Success(files) => {
                let dir = files
                    .first()
                    .and_then(|p| p.parent())
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                fill(text.chapter_success, &[label, &files.len(), &dir])
            }
            ChapterOutcome::NoAssets => fill(text.chapter_no_assets, &[label]),
            ChapterOutcome::Failed(reason) => fill(text.chapter_failed, &[label, reason]),
        }),
        _ => None,
    }
}

fn print_summary(text: &Strings, result: &DownloadResult) {
    println!("{}", text.summary_title);
    println!("{}", fill(text.summary_success, &[&result.success]));
    println!("{}", fill(text.summary_no_assets, &[&result.no_assets]));
    println!("{}", fill(text.summary_failed, &[&result.failed]));
    println!("{}", text.summary_footer);
}

fn ask_continue(text: &Strings) -> Result<bool> {
    loop {
        println!("\n{}", text.continue_prompt);
        println!("1. {}", text.search_again_option);
        println!("2. {}", text.exit_option);
        let Some(choice) = read_line("> ")? else {
            return Ok(false);
        };
        match choice.trim() {
            "1" => return Ok(true),
            "2" => {
                println!("{}", text.exiting);
                return Ok(false);
            }
            _ => println!("{}", text.invalid_option),
        }
    }
}

/// 命令行给出的语言优先；无效或缺省时进入菜单，回车选择配置中的默认语言。
fn pick_language(config: &Config, requested: Option<&str>) -> Result<Option<Language>> {
    let fallback = Language::from_code(&config.language).unwrap_or(Language::PtBr);
    if let Some(code) = requested {
        if let Some(lang) = Language::from_code(code) {
            return Ok(Some(lang));
        }
        warn!(target: "ui", code, "无效的语言代码");
        println!("{}", fill(fallback.strings().invalid_language, &[&code]));
    }

    let text = fallback.strings();
    loop {
        println!("\n{}", text.language_prompt);
        for (idx, lang) in LANGUAGES.iter().enumerate() {
            let marker = if *lang == fallback { " *" } else { "" };
            println!("{}. {} ({}){}", idx + 1, lang.name(), lang.code(), marker);
        }
        let Some(choice) = read_line("> ")? else {
            return Ok(None);
        };
        let choice = choice.trim();
        if choice.is_empty() {
            return Ok(Some(fallback));
        }
        if let Ok(n) = choice.parse::<usize>()
            && (1..=LANGUAGES.len()).contains(&n)
        {
            return Ok(Some(LANGUAGES[n - 1]));
        }
        if let Some(lang) = Language::from_code(choice) {
            return Ok(Some(lang));
        }
        println!("{}", text.invalid_option);
    }
}

/// 读取一行输入；stdin 关闭时返回 `None`。
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let stdin = io::stdin();
    let mut line = String::new();
    if stdin.lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}
