//! Tianji CLI - 命令行问询接口

mod session;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tj_core::TianjiError;
use tj_engine::{AnalysisReport, DecisionEngine, EngineConfig, ProgressStatus};
use tj_theory::{Theory, TheoryRegistry};

use session::{Session, SETTABLE};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tianji_cli=info,tj_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("TIANJI_CONFIG") {
        Ok(path) => EngineConfig::load_or_default(path),
        Err(_) => EngineConfig::default(),
    };
    let engine = DecisionEngine::new(Arc::new(TheoryRegistry::with_defaults()), config);
    let narrator = engine.simplified_narrator();
    let mut session = Session::new();

    println!("Tianji CLI v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for available commands, 'quit' to exit.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("tj> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            continue;
        };

        match command {
            "help" => print_help(),
            "theories" => print_theories(&engine),
            "set" => match args.split_first() {
                Some((field, values)) => {
                    if let Err(e) = session.set(field, values) {
                        println!("Error: {e}");
                    }
                }
                None => println!("Usage: set <field> <values..>"),
            },
            "show" => {
                for entry in session.summary() {
                    println!("  {entry}");
                }
            }
            "select" => print_selection(&engine, &session),
            "ask" => {
                let input = session.snapshot();
                let analysis = engine.analyze_with_narrative(&input, print_progress, &narrator);
                let outcome = tokio::select! {
                    result = analysis => result,
                    _ = tokio::signal::ctrl_c() => Err(TianjiError::Cancelled),
                };
                match outcome {
                    Ok(report) => print_report(&report),
                    Err(e) => println!("Error: {e}"),
                }
            }
            "reset" => {
                session.reset();
                println!("Session cleared.");
            }
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
            }
            "quit" | "exit" => {
                println!("Goodbye!");
                break;
            }
            _ => {
                println!("Unknown command: {}", command);
                println!("Type 'help' for available commands.");
            }
        }
    }

    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  help                  - Show this help message");
    println!("  theories              - List registered theories");
    println!("  set <field> <values>  - Fill in a question field:");
    for (field, usage) in SETTABLE {
        println!("      {field:<10} {usage}");
    }
    println!("  show                  - Show the current question");
    println!("  select                - Preview theory selection");
    println!("  ask                   - Run the full analysis");
    println!("  reset                 - Start a new question");
    println!("  clear                 - Clear the screen");
    println!("  quit / exit           - Exit the CLI");
}

fn print_theories(engine: &DecisionEngine) {
    println!("Registered theories:");
    for theory in engine.registry().iter() {
        let descriptor = theory.descriptor();
        let required: Vec<&str> = descriptor
            .required_fields
            .iter()
            .map(|f| f.label())
            .collect();
        println!(
            "  {} [{}] 最小完备度 {:.2}{} 必需: {}",
            theory.name(),
            descriptor.speed.label(),
            descriptor.min_completeness,
            if descriptor.is_fallback() { " (兜底)" } else { "" },
            if required.is_empty() {
                "-".to_string()
            } else {
                required.join("、")
            }
        );
    }
}

fn print_selection(engine: &DecisionEngine, session: &Session) {
    let selector = engine.selector();
    let selection = selector.select_theories(&session.snapshot());
    println!("Selected theories:");
    for s in &selection.selected {
        println!(
            "  {} [{}] 适配度 {:.3} ({})",
            s.name,
            s.priority.label(),
            s.fitness,
            s.reason
        );
    }
    let order = selector.determine_execution_order(&selection.selected);
    println!("Execution order: {}", order.join(" → "));
    if let Some(missing) = &selection.missing_info {
        let labels: Vec<&str> = missing.iter().map(|f| f.label()).collect();
        println!("补充以下信息可启用更多理论: {}", labels.join("、"));
    }
}

fn print_progress(name: &str, status: ProgressStatus) {
    let mark = match status {
        ProgressStatus::Started => "…",
        ProgressStatus::Completed => "✓",
        ProgressStatus::Failed => "✗",
    };
    println!("  {mark} {name}");
}

fn print_report(report: &AnalysisReport) {
    let decision = &report.decision;
    println!();
    println!(
        "判断: {}  共识 {:.3}  一致性 {:.3}  置信度 {:.3}",
        decision.judgment.label(),
        decision.consensus_level,
        decision.agreement,
        decision.confidence
    );
    if let Some(timing) = &decision.timing {
        println!("应期: {timing}");
    }
    println!("Contributions:");
    for c in &decision.contributions {
        println!(
            "  {} 权重 {:.3} {} ({:.2})",
            c.theory,
            c.weight,
            c.judgment.label(),
            c.judgment_level
        );
    }
    for conflict in &decision.conflicts {
        println!(
            "  冲突[{}] {} ↔ {} 差距 {:.2}",
            conflict.level.label(),
            conflict.theory_a,
            conflict.theory_b,
            conflict.gap
        );
    }
    if let Some(arbitration) = &decision.arbitration {
        println!(
            "  裁决[{}] 得票 {:.2}: {}",
            arbitration.arbiter, arbitration.vote_share, arbitration.explanation
        );
    }
    println!();
    match &report.narrative {
        Some(narrative) => println!("{}", narrative.text),
        None => println!("{}", decision.synthesized_advice()),
    }
    let warnings = report.warnings().count();
    if warnings > 0 {
        println!("({warnings} warnings, set RUST_LOG=tj_engine=debug for details)");
    }
}
