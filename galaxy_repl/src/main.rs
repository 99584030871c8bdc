use std::{
    io::Write,
    ops::Range,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use codesnake::{Block, CodeWidth, Label, LineIndex};
use galaxy::{
    modem::{demodulate_value, modulate_value},
    BoxError, Interpreter, Limits, LoadError, Protocol, Transport,
};
use tracing_subscriber::EnvFilter;
use yansi::Paint;

/// Interactive evaluator for galaxy protocol programs
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Program listing of `name = <expr>` lines to load
    #[arg(long)]
    program: Option<PathBuf>,
    /// Name of the protocol function driven by `:click`
    #[arg(long, default_value = "galaxy")]
    protocol: String,
    /// Reduction steps allowed per evaluation
    #[arg(long, default_value_t = Limits::default().fuel)]
    fuel: i32,
    /// Nested evaluations allowed per evaluation
    #[arg(long, default_value_t = 200_000)]
    max_depth: usize,
    /// Stack size of the evaluation thread, in MiB
    #[arg(long, default_value_t = 1024)]
    stack_mib: usize,
}

/// Relays requests over stdout and reads the peer's answer from stdin
struct StdinRelay;

impl Transport for StdinRelay {
    fn send(&mut self, request: &str) -> Result<String, BoxError> {
        println!("{} {request}", "send>".cyan());
        print!("{} ", "recv>".cyan());
        std::io::stdout().flush()?;
        let mut response = String::new();
        std::io::stdin().read_line(&mut response)?;
        Ok(response)
    }
}

/// Points at `span` of `source` with `message`
fn report(source: &str, name: &str, span: Range<usize>, message: &str) {
    let idx = LineIndex::new(source);
    let block = (!span.is_empty())
        .then(|| {
            Block::new(
                &idx,
                [Label::new(span)
                    .with_text(message.red().to_string())
                    .with_style(|s: String| s.red().to_string())],
            )
        })
        .flatten();
    match block {
        Some(block) => {
            let block = block.map_code(|c| CodeWidth::new(c, c.len()));
            println!("{}[{name}]", block.prologue());
            print!("{block}");
            println!("{}", block.epilogue());
        }
        None => println!("{}", message.red()),
    }
}

fn load(path: Option<&Path>, limits: Limits) -> anyhow::Result<Interpreter> {
    let Some(path) = path else {
        return Ok(Interpreter::load("", limits)?);
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    match Interpreter::load(&source, limits) {
        Ok(interpreter) => Ok(interpreter),
        Err(LoadError::Parse(err)) => {
            report(&source, &path.display().to_string(), err.span(), &err.to_string());
            anyhow::bail!("could not parse {}", path.display())
        }
        Err(err) => Err(err).with_context(|| format!("could not load {}", path.display())),
    }
}

fn point(args: &str) -> anyhow::Result<(i64, i64)> {
    let mut coords = args.split_whitespace().map(str::parse::<i64>);
    match (coords.next(), coords.next(), coords.next()) {
        (Some(x), Some(y), None) => Ok((x?, y?)),
        _ => anyhow::bail!("usage: :click <x> <y>"),
    }
}

fn command(
    interpreter: &mut Interpreter,
    protocol: &mut Protocol,
    input: &str,
) -> anyhow::Result<()> {
    let (cmd, rest) = input.split_once(' ').unwrap_or((input, ""));
    match cmd {
        ":mod" => {
            let expr = match interpreter.parse(rest) {
                Ok(expr) => expr,
                Err(err) => {
                    report(rest, "input", err.span(), &err.to_string());
                    return Ok(());
                }
            };
            let value = interpreter.force_value(expr)?;
            println!("{}", modulate_value(&value));
        }
        ":dem" => println!("{}", demodulate_value(rest.trim())?),
        ":click" => {
            let images = protocol.click(interpreter, point(rest)?, &mut StdinRelay)?;
            for (idx, image) in images.iter().enumerate() {
                let points: Vec<_> = image.iter().map(|(x, y)| format!("({x}, {y})")).collect();
                println!("{} {}", format!("image {idx}:").green(), points.join(" "));
            }
        }
        ":undo" => {
            if !protocol.undo() {
                println!("{}", "nothing to undo".yellow());
            }
            println!("{}", protocol.state());
        }
        ":state" => println!("{}", protocol.state()),
        _ => anyhow::bail!("unknown command {cmd}, expected :mod :dem :click :undo or :state"),
    }
    Ok(())
}

fn run(args: Args) -> anyhow::Result<()> {
    let limits = Limits {
        fuel: args.fuel,
        max_depth: args.max_depth,
    };
    let mut interpreter = load(args.program.as_deref(), limits)?;
    tracing::info!(
        definitions = interpreter.functions().len(),
        protocol = %args.protocol,
        "ready"
    );
    let mut protocol = Protocol::new(&mut interpreter, &args.protocol);
    let mut readline = rustyline::DefaultEditor::new()?;

    while let Ok(input) = readline.readline(">> ") {
        let src = input.trim();
        if src.is_empty() {
            continue;
        }
        _ = readline.add_history_entry(src);

        let result = if src.starts_with(':') {
            command(&mut interpreter, &mut protocol, src)
        } else {
            match interpreter.parse(src) {
                Ok(expr) => interpreter
                    .evaluate(expr)
                    .map(|reduced| println!("{}", interpreter.world().display(reduced)))
                    .map_err(Into::into),
                Err(err) => {
                    report(src, "input", err.span(), &err.to_string());
                    Ok(())
                }
            }
        };
        if let Err(err) = result {
            println!("{} {err:#}", "error:".red());
        }
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    // reduction recurses on the native stack, give it room
    let stack_size = args.stack_mib * 1024 * 1024;
    std::thread::Builder::new()
        .name(String::from("galaxy-eval"))
        .stack_size(stack_size)
        .spawn(move || run(args))?
        .join()
        .map_err(|_| anyhow::anyhow!("evaluation thread panicked"))?
}
