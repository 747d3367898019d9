use std::{
    fmt, fs,
    io::{self, BufRead, BufReader, Read},
    mem,
    path::Path,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, info};
use xz2::read::XzDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Load,
    Store,
    Modify,
    /// Instruction fetch or any other marker that does not touch the data cache.
    Other(char),
}

impl From<char> for Op {
    fn from(c: char) -> Self {
        match c {
            'L' => Op::Load,
            'S' => Op::Store,
            'M' => Op::Modify,
            c => Op::Other(c),
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Op::Load => 'L',
            Op::Store => 'S',
            Op::Modify => 'M',
            Op::Other(c) => *c,
        };
        write!(f, "{c}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub op: Op,
    pub addr: u64,
    /// Access width in bytes. Carried for display only.
    pub size: u64,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:x},{}", self.op, self.addr, self.size)
    }
}

/// Parses one `OP ADDR,SIZE` trace line, `ADDR` in hex and `SIZE` in decimal.
pub fn parse_line(line: &str) -> Option<Access> {
    let mut chars = line.trim().chars();
    let op = Op::from(chars.next()?);
    let (addr, size) = chars.as_str().split_once(',')?;

    let addr = addr.trim_start();
    let addr = addr
        .strip_prefix("0x")
        .or_else(|| addr.strip_prefix("0X"))
        .unwrap_or(addr);
    if addr.is_empty() || !addr.bytes().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let addr = u64::from_str_radix(addr, 16).ok()?;
    let size = size.trim().parse().ok()?;

    Some(Access { op, addr, size })
}

pub struct Trace {
    pub rec: Receiver<Vec<Access>>,
    _thread: JoinHandle<()>,
}

impl Trace {
    /// Opens `path` and streams its records in blocks of `access_per_block`
    /// from a reader thread. Paths ending in `.xz` are decompressed.
    pub fn read(path: &Path, access_per_block: usize, blocks_per_queue: usize) -> io::Result<Trace> {
        let file = fs::File::open(path)?;
        let stream: Box<dyn Read + Send> = match path.extension() {
            Some(ext) if ext == "xz" => Box::new(XzDecoder::new(file)),
            _ => Box::new(file),
        };
        info!("reading trace {}", path.display());

        let (sender, receiver) = crossbeam::channel::bounded(blocks_per_queue);
        let t = thread::spawn(move || {
            Trace::run_thread(BufReader::new(stream), access_per_block, sender)
        });

        Ok(Trace {
            rec: receiver,
            _thread: t,
        })
    }

    fn run_thread<R: BufRead>(mut stream: R, access_per_block: usize, queue: Sender<Vec<Access>>) {
        let mut buffer = Vec::with_capacity(access_per_block);
        let mut raw = Vec::new();
        let mut line_no = 0u64;
        loop {
            raw.clear();
            match stream.read_until(b'\n', &mut raw) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    error!("trace read failed after line {line_no}: {err}");
                    break;
                }
            }
            line_no += 1;

            let line = String::from_utf8_lossy(&raw);
            match parse_line(&line) {
                Some(access) => buffer.push(access),
                None if line.trim().is_empty() => {}
                None => debug!("skipping malformed trace line {line_no}: {:?}", line.trim_end()),
            }

            if buffer.len() >= access_per_block {
                let block = mem::replace(&mut buffer, Vec::with_capacity(access_per_block));
                if queue.send(block).is_err() {
                    return;
                }
            }
        }
        if !buffer.is_empty() {
            let _ = queue.send(buffer);
        }
        debug!("trace reader finished after {line_no} lines");
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf};

    use super::*;

    fn temp_trace(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("csim-{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parses_valgrind_style_lines() {
        assert_eq!(
            parse_line(" L 10,1"),
            Some(Access {
                op: Op::Load,
                addr: 0x10,
                size: 1
            })
        );
        assert_eq!(
            parse_line(" M 0421c7f0,4\n"),
            Some(Access {
                op: Op::Modify,
                addr: 0x0421c7f0,
                size: 4
            })
        );
        assert_eq!(
            parse_line("I  0400d7d4,8").map(|a| a.op),
            Some(Op::Other('I'))
        );
        assert_eq!(
            parse_line("S 0xffffffffffffffff,8").map(|a| a.addr),
            Some(u64::MAX)
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "",
            "   ",
            "L",
            "L 10",
            "L ,1",
            "L zz,1",
            "L 10,",
            "L 10,x",
            "L 10,-1",
            "L +10,1",
            "L 1ffffffffffffffff,1",
            "==12345== Memcheck",
        ] {
            assert_eq!(parse_line(line), None, "{line:?}");
        }
    }

    #[test]
    fn accepts_any_decimal_size() {
        assert_eq!(parse_line("L 10,4294967296").map(|a| a.size), Some(1 << 32));
        assert_eq!(
            parse_line("S 10,18446744073709551615").map(|a| a.size),
            Some(u64::MAX)
        );
    }

    #[test]
    fn display_matches_input_form() {
        let access = parse_line(" S 7ff000398,8").unwrap();
        assert_eq!(access.to_string(), "S 7ff000398,8");
    }

    #[test]
    fn streams_blocks_in_order() {
        let path = temp_trace(
            "blocks.trace",
            b"I 0400d7d4,8\n L 10,1\n garbage\n M 20,1\n\n S 30,1\n L 40,4",
        );
        let trace = Trace::read(&path, 2, 1).unwrap();
        let blocks: Vec<Vec<Access>> = trace.rec.iter().collect();
        fs::remove_file(&path).unwrap();

        assert_eq!(blocks.iter().map(Vec::len).collect::<Vec<_>>(), [2, 2, 1]);
        let ops: Vec<Op> = blocks.concat().iter().map(|a| a.op).collect();
        assert_eq!(
            ops,
            [Op::Other('I'), Op::Load, Op::Modify, Op::Store, Op::Load]
        );
    }

    #[test]
    fn reads_xz_compressed_traces() {
        let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
        encoder.write_all(b" L 10,1\n S 18,1\n").unwrap();
        let path = temp_trace("compressed.trace.xz", &encoder.finish().unwrap());

        let trace = Trace::read(&path, 16, 4).unwrap();
        let accesses: Vec<Access> = trace.rec.iter().flatten().collect();
        fs::remove_file(&path).unwrap();

        assert_eq!(accesses.len(), 2);
        assert_eq!(accesses[1].addr, 0x18);
    }

    #[test]
    fn corrupt_xz_yields_no_records() {
        let path = temp_trace("corrupt.trace.xz", b" L 10,1\n S 18,1\n");
        let trace = Trace::read(&path, 16, 4).unwrap();
        let accesses: Vec<Access> = trace.rec.iter().flatten().collect();
        fs::remove_file(&path).unwrap();

        assert!(accesses.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("csim-does-not-exist.trace");
        assert!(Trace::read(&path, 16, 4).is_err());
    }
}
