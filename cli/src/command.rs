//! Line command parsing for `mobdevctl`

use mobdev::Whence;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open { device: usize },
    Close { fd: usize },
    Read { fd: usize, len: usize },
    Write { fd: usize, data: Vec<u8> },
    Seek { fd: usize, whence: Whence, delta: i64 },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  open <dev>                       open device <dev>, prints a descriptor
  close <fd>                       close a descriptor
  read <fd> <len>                  read up to <len> bytes
  write <fd> <text...>             write the rest of the line
  seek <fd> <set|cur|end> <delta>  move the position
  status                           print the status report
  help                             this text
  quit                             unload the driver and exit";

/// Parse one input line; `Ok(None)` for a blank line
///
/// # Errors
/// A message describing what is wrong with the line.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word {
        "open" => Command::Open {
            device: number(rest, "device")?,
        },
        "close" => Command::Close {
            fd: number(rest, "fd")?,
        },
        "read" => {
            let (fd, rest) = split_word(rest).ok_or("read: missing fd")?;
            Command::Read {
                fd: number(fd, "fd")?,
                len: number(rest, "len")?,
            }
        }
        "write" => {
            let (fd, rest) = split_word(rest).ok_or("write: missing fd")?;
            Command::Write {
                fd: number(fd, "fd")?,
                data: rest.as_bytes().to_vec(),
            }
        }
        "seek" => {
            let (fd, rest) = split_word(rest).ok_or("seek: missing fd")?;
            let (whence, rest) = split_word(rest).ok_or("seek: missing whence")?;
            Command::Seek {
                fd: number(fd, "fd")?,
                whence: parse_whence(whence)?,
                delta: number(rest, "delta")?,
            }
        }
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.split_once(char::is_whitespace) {
        Some((word, rest)) => Some((word, rest.trim_start())),
        None => Some((s, "")),
    }
}

fn number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("missing {what}"));
    }
    s.parse().map_err(|_| format!("invalid {what} '{s}'"))
}

fn parse_whence(s: &str) -> Result<Whence, String> {
    match s {
        "set" => Ok(Whence::Set),
        "cur" => Ok(Whence::Cur),
        "end" => Ok(Whence::End),
        other => Err(format!("invalid whence '{other}', expected set, cur or end")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_line() {
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse("open 0"), Ok(Some(Command::Open { device: 0 })));
        assert_eq!(parse("close 3"), Ok(Some(Command::Close { fd: 3 })));
        assert_eq!(
            parse("read 1 20"),
            Ok(Some(Command::Read { fd: 1, len: 20 }))
        );
        assert_eq!(
            parse("seek 1 end -5"),
            Ok(Some(Command::Seek {
                fd: 1,
                whence: Whence::End,
                delta: -5
            }))
        );
        assert_eq!(parse("status"), Ok(Some(Command::Status)));
        assert_eq!(parse("quit"), Ok(Some(Command::Quit)));
    }

    #[test]
    fn test_write_keeps_inner_spaces() {
        assert_eq!(
            parse("write 2   hello  world "),
            Ok(Some(Command::Write {
                fd: 2,
                data: b"hello  world".to_vec()
            }))
        );
        assert_eq!(
            parse("write 2"),
            Ok(Some(Command::Write {
                fd: 2,
                data: Vec::new()
            }))
        );
    }

    #[test]
    fn test_errors() {
        assert!(parse("open").is_err());
        assert!(parse("open x").is_err());
        assert!(parse("read 1").is_err());
        assert!(parse("seek 1 middle 4").is_err());
        assert!(parse("frobnicate").is_err());
    }
}
