use datatest_stable::Utf8Path;
use galaxy::{
    modem::{demodulate_value, modulate_value},
    Interpreter, Limits,
};

#[derive(thiserror::Error, Debug)]
#[error("mismatch(es) in datatest at {0}")]
pub struct DatatestError(Box<Utf8Path>);

/// A datatest file is made of three sections separated by `---` lines:
/// expected errors, expected output and the source under test. Lines starting
/// with `;` before the source are comments and are kept at the top when the
/// file is rewritten.
struct Datatest<'a> {
    comments: Vec<&'a str>,
    errors: Vec<&'a str>,
    output: Vec<&'a str>,
    source: String,
}

impl<'a> Datatest<'a> {
    fn read(contents: &'a str) -> Self {
        let mut test = Datatest {
            comments: vec![],
            errors: vec![],
            output: vec![],
            source: String::new(),
        };
        let mut section = 0;
        for line in contents.lines() {
            if section < 2 && line.trim_start().starts_with(';') {
                test.comments.push(line);
                continue;
            }
            if section < 2 && line.trim_end() == "---" {
                section += 1;
                continue;
            }
            match section {
                0 => test.errors.push(line),
                1 => test.output.push(line),
                _ => {
                    if !test.source.is_empty() {
                        test.source.push('\n');
                    }
                    test.source.push_str(line);
                }
            }
        }
        test
    }

    // from https://matklad.github.io/2021/05/31/how-to-test.html
    // with DATATEST_EXPECT set, rewrite the expectations instead of checking them
    fn check(&self, path: &Utf8Path, errors: &[String], output: &[String]) -> datatest_stable::Result<()> {
        if std::env::var("DATATEST_EXPECT").is_ok() {
            let mut lines: Vec<&str> = self.comments.clone();
            lines.extend(errors.iter().map(String::as_str));
            lines.push("---");
            lines.extend(output.iter().map(String::as_str));
            lines.push("---");
            lines.push(&self.source);
            let mut contents = lines.join("\n");
            contents.push('\n');
            std::fs::write(path, contents)?;
            return Ok(());
        }

        let mut failed = false;
        for (name, expected, got) in [("errors", &self.errors, errors), ("output", &self.output, output)] {
            let expected: Vec<&str> = expected.iter().map(|line| line.trim()).collect();
            if expected != got.iter().map(|line| line.trim()).collect::<Vec<_>>() {
                println!(
                    "{path}: mismatched {name}\n\nGot:\n{}\n\nExpected:\n{}",
                    got.join("\n"),
                    expected.join("\n")
                );
                failed = true;
            }
        }
        if failed {
            Err(DatatestError(Box::from(path)))?
        } else {
            Ok(())
        }
    }
}

/// Loads the program and prints the fully reduced value of `main`
fn eval_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let test = Datatest::read(&contents);
    let limits = Limits {
        fuel: 1_000_000,
        max_depth: 500,
    };
    let (errors, output) = match Interpreter::load(&test.source, limits) {
        Err(err) => (vec![format!("load: {err}")], vec![]),
        Ok(mut interpreter) => {
            let main = interpreter.world_mut().intern_symbol("main");
            match interpreter.force_value(main) {
                Ok(value) => (vec![], vec![value.to_string()]),
                Err(err) => (vec![format!("eval: {err}")], vec![]),
            }
        }
    };
    test.check(path, &errors, &output)
}

/// Each source line is an expression; the output is its modulated form and
/// the decoded bits must give the same value back
fn modem_test(path: &Utf8Path, contents: String) -> datatest_stable::Result<()> {
    let test = Datatest::read(&contents);
    let mut interpreter = Interpreter::load("", Limits::default())?;
    let mut errors = vec![];
    let mut output = vec![];
    for (idx, line) in test.source.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let value = match interpreter.parse(line) {
            Ok(expr) => interpreter.force_value(expr).map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        match value {
            Ok(value) => {
                let bits = modulate_value(&value);
                match demodulate_value(&bits) {
                    Ok(decoded) if decoded == value => {}
                    decoded => errors.push(format!("{}: round trip gave {decoded:?}", idx + 1)),
                }
                output.push(bits);
            }
            Err(err) => errors.push(format!("{}: {err}", idx + 1)),
        }
    }
    test.check(path, &errors, &output)
}

datatest_stable::harness! {
    eval_test, "test_data", r"^.*\.evd",
    modem_test, "test_data", r"^.*\.mdd",
}
