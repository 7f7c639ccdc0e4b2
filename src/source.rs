//! Newline-delimited JSON frames from the external hand-pose estimator.
//!
//! One line per camera frame:
//! `{"hands":[{"label":"Right","landmarks":[{"x":0.51,"y":0.42,"z":-0.03}, ...]}]}`

use anyhow::{Result, anyhow};
use log::{error, warn};
use serde::Deserialize;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};

use crate::hand::HandObservation;

#[derive(Debug, Default, Deserialize)]
struct WireFrame {
    #[serde(default)]
    hands: Vec<HandObservation>,
}

/// `Ok(None)` for blank lines and `#` comments.
pub fn parse_frame(line: &str) -> Result<Option<Vec<HandObservation>>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let frame: WireFrame = serde_json::from_str(line)?;
    Ok(Some(frame.hands))
}

pub struct FrameReader<R> {
    reader: R,
    line_no: usize,
}

impl<R: BufRead> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, line_no: 0 }
    }
}

/// Opens `path`, or stdin for `None` / `"-"`. FIFOs work as well.
pub fn open(path: Option<&str>) -> Result<FrameReader<Box<dyn BufRead + Send>>> {
    let reader: Box<dyn BufRead + Send> = match path {
        None | Some("-") => Box::new(BufReader::new(io::stdin())),
        Some(p) => {
            let f = File::open(p).map_err(|e| anyhow!("failed to open frame source {p}: {e}"))?;
            Box::new(BufReader::new(f))
        }
    };
    Ok(FrameReader::new(reader))
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Vec<HandObservation>;

    /// Skips malformed lines, including ones that are not UTF-8; ends on EOF
    /// or an I/O error.
    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            self.line_no += 1;
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = match std::str::from_utf8(&buf) {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("frame source line {}: {e}", self.line_no);
                            continue;
                        }
                    };
                    match parse_frame(line) {
                        Ok(Some(hands)) => return Some(hands),
                        Ok(None) => continue,
                        Err(e) => warn!("frame source line {}: {e}", self.line_no),
                    }
                }
                Err(e) => {
                    error!("frame source read failed: {e}");
                    return None;
                }
            }
        }
    }
}
