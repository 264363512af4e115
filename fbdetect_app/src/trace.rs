//! Textual command traces.
//!
//! ```text
//! # comment
//! ucode 2
//! vi 00100280
//! scale 2.0 2.0
//! db060018 00100000
//! ff10013f 06000000
//! frame
//! ```

use fbdetect_lib::{Command, Ucode};
use crate::error::{AppError, Result};

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum Item {
    Ucode(Ucode),
    /// End of the current frame
    Frame,
    ViOrigin(u32),
    Scale(f32, f32),
    Command(Command),
}

pub fn parse(text: &str) -> Result<Vec<Item>> {
    let mut items = Vec::new();

    for (n, line) in text.lines().enumerate() {
        let line = match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        };

        let words: Vec<&str> = line.split_whitespace().collect();

        if words.is_empty() {
            continue;
        }

        let item = parse_item(&words).map_err(|msg| AppError::Trace { line: n + 1, msg })?;

        items.push(item);
    }

    Ok(items)
}

fn parse_item(words: &[&str]) -> ::std::result::Result<Item, String> {
    match words {
        ["frame"] => Ok(Item::Frame),
        ["ucode", id] => {
            let id = id.parse::<u32>().map_err(|e| format!("bad microcode id {}: {}", id, e))?;

            Ucode::from_id(id).map(Item::Ucode).map_err(|e| e.to_string())
        }
        ["vi", origin] => parse_hex(origin).map(Item::ViOrigin),
        ["scale", x, y] => {
            let x = x.parse::<f32>().map_err(|e| format!("bad scale {}: {}", x, e))?;
            let y = y.parse::<f32>().map_err(|e| format!("bad scale {}: {}", y, e))?;

            Ok(Item::Scale(x, y))
        }
        [w0, w1] => Ok(Item::Command(Command::new(parse_hex(w0)?, parse_hex(w1)?))),
        _ => Err(format!("can't parse \"{}\"", words.join(" "))),
    }
}

fn parse_hex(s: &str) -> ::std::result::Result<u32, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    u32::from_str_radix(digits, 16).map_err(|e| format!("bad word {}: {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trace() {
        let items = parse(
            "# Zelda-ish\n\
             ucode 2\n\
             \n\
             vi 0x00100280  # origin\n\
             scale 2 1.5\n\
             FF10013F 06000000\n\
             frame\n",
        )
        .unwrap();

        assert_eq!(
            items,
            [
                Item::Ucode(Ucode::F3dex2),
                Item::ViOrigin(0x10_0280),
                Item::Scale(2., 1.5),
                Item::Command(Command::new(0xff10_013f, 0x0600_0000)),
                Item::Frame,
            ]
        );
    }

    #[test]
    fn errors_have_line_numbers() {
        match parse("frame\nff10013f\n") {
            Err(AppError::Trace { line, .. }) => assert_eq!(line, 2),
            r => panic!("unexpected {:?}", r),
        }

        assert!(matches!(parse("ucode 9"), Err(AppError::Trace { line: 1, .. })));
        assert!(matches!(parse("vi zz"), Err(AppError::Trace { line: 1, .. })));
    }
}
