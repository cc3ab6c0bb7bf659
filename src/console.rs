//! Interactive labeling on the terminal

use linkx_core::{Record, Result};
use linkx_learn::{LabelResponse, LabelingOracle};
use std::io::{BufRead, Write};

/// Asks a person whether two records refer to the same thing.
///
/// Answers are `y`es, `n`o, `u`nsure (skip) and `f`inished. End of input
/// counts as finished.
pub struct ConsoleOracle<R, W> {
    input: R,
    output: W,
    fields: Vec<String>,
}

impl ConsoleOracle<std::io::StdinLock<'static>, std::io::Stderr> {
    /// Prompt on stderr, read answers from stdin
    pub fn stdio(fields: Vec<String>) -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr(), fields)
    }
}

impl<R: BufRead, W: Write> ConsoleOracle<R, W> {
    /// Show `fields` of each record; all fields when empty
    pub fn new(input: R, output: W, fields: Vec<String>) -> Self {
        Self { input, output, fields }
    }

    fn show(&mut self, a: &Record, b: &Record) -> std::io::Result<()> {
        let names: Vec<String> = if self.fields.is_empty() {
            let mut all: Vec<String> = a.fields().keys().chain(b.fields().keys()).cloned().collect();
            all.sort();
            all.dedup();
            all
        } else {
            self.fields.clone()
        };

        writeln!(self.output)?;
        for record in [a, b] {
            writeln!(self.output, "[{}]", record.id)?;
            for name in &names {
                let value = record.get(name).map(|v| v.to_text()).unwrap_or_default();
                writeln!(self.output, "  {} : {}", name, value)?;
            }
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> LabelingOracle for ConsoleOracle<R, W> {
    fn label(&mut self, a: &Record, b: &Record) -> Result<LabelResponse> {
        self.show(a, b)?;
        loop {
            write!(
                self.output,
                "Do these records refer to the same thing? (y)es / (n)o / (u)nsure / (f)inished: "
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(LabelResponse::Finished);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(LabelResponse::Match),
                "n" | "no" => return Ok(LabelResponse::Distinct),
                "u" | "unsure" => return Ok(LabelResponse::Skip),
                "f" | "finished" => return Ok(LabelResponse::Finished),
                other => writeln!(self.output, "unrecognised answer '{}'", other)?,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pair() -> (Record, Record) {
        (
            Record::from_pairs("c1".into(), [("address", "100 main st")]),
            Record::from_pairs("m1".into(), [("address", "100 main street")]),
        )
    }

    fn answer(input: &str) -> (LabelResponse, String) {
        let (a, b) = pair();
        let mut out = Vec::new();
        let response = {
            let mut oracle = ConsoleOracle::new(Cursor::new(input.as_bytes()), &mut out, Vec::new());
            oracle.label(&a, &b).unwrap()
        };
        (response, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_answers() {
        assert_eq!(answer("y\n").0, LabelResponse::Match);
        assert_eq!(answer("NO\n").0, LabelResponse::Distinct);
        assert_eq!(answer("u\n").0, LabelResponse::Skip);
        assert_eq!(answer("f\n").0, LabelResponse::Finished);
        assert_eq!(answer("").0, LabelResponse::Finished);
    }

    #[test]
    fn test_reprompts_on_garbage() {
        let (response, shown) = answer("maybe\ny\n");
        assert_eq!(response, LabelResponse::Match);
        assert!(shown.contains("unrecognised answer 'maybe'"));
        assert!(shown.contains("address : 100 main street"));
        assert!(shown.contains("[c1]"));
    }
}
