//! Record-level manifest decoder.
//!
//! A manifest is a stream of `<cmd><4 hex len><payload>\n` records. One
//! entry is an optional data path, an attributes record, the path record,
//! a link target for links, and in protocol 1 an optional trailing end-file
//! record for entries with data. Protocol 2 interleaves signature records,
//! which are skipped, and end-file markers, which are returned as their own
//! entries.

use super::{ManifestEntry, ManifestReader, Protocol, Stat};
use crate::proto::{decode_header, Command, HEADER_LEN};
use crate::utils::ManifestError;
use tokio::io::{AsyncBufRead, AsyncReadExt};

struct Record {
    cmd: Command,
    payload: Vec<u8>,
}

impl Record {
    /// Paths are raw bytes on disk; anything that is not UTF-8 is shown
    /// with replacement characters rather than failing the whole manifest.
    fn into_text(self) -> String {
        match String::from_utf8(self.payload) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    }
}

pub struct ManioReader<R> {
    inner: R,
    protocol: Protocol,
    pending: Option<Record>,
}

impl<R> ManioReader<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(inner: R, protocol: Protocol) -> Self {
        Self {
            inner,
            protocol,
            pending: None,
        }
    }

    /// Next record, or `None` at a clean end of input.
    async fn read_record(&mut self) -> Result<Option<Record>, ManifestError> {
        if let Some(rec) = self.pending.take() {
            return Ok(Some(rec));
        }

        let mut header = [0u8; HEADER_LEN];
        let mut filled = 0;
        while filled < HEADER_LEN {
            let n = self.inner.read(&mut header[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        match filled {
            0 => return Ok(None),
            n if n < HEADER_LEN => return Err(ManifestError::Truncated),
            _ => {}
        }

        let (cmd, len) = decode_header(&header).map_err(ManifestError::BadHeader)?;
        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(truncated_on_eof)?;
        let terminator = self.inner.read_u8().await.map_err(truncated_on_eof)?;
        if terminator != b'\n' {
            return Err(ManifestError::BadHeader(format!(
                "record for {:?} not newline terminated",
                cmd.as_char()
            )));
        }
        Ok(Some(Record { cmd, payload }))
    }

    async fn expect_record(&mut self) -> Result<Record, ManifestError> {
        self.read_record().await?.ok_or(ManifestError::Truncated)
    }

    async fn finish_entry(
        &mut self,
        stat: Stat,
        datapth: Option<String>,
    ) -> Result<ManifestEntry, ManifestError> {
        let path_rec = self.expect_record().await?;
        if !path_rec.cmd.is_path() {
            return Err(ManifestError::UnexpectedCommand {
                found: path_rec.cmd.as_char(),
                expected: "a path record",
            });
        }
        let cmd = path_rec.cmd;
        let mut entry = ManifestEntry::new(cmd, path_rec.into_text(), stat);
        entry.datapth = datapth;

        if cmd.is_link() {
            let target = self.expect_record().await?;
            if target.cmd != cmd {
                return Err(ManifestError::UnexpectedCommand {
                    found: target.cmd.as_char(),
                    expected: "a link target",
                });
            }
            entry.link_target = Some(target.into_text());
        }

        if self.protocol == Protocol::V1 && cmd.has_data() {
            match self.read_record().await? {
                Some(rec) if rec.cmd == Command::EndFile => {
                    entry.endfile = Some(rec.into_text());
                }
                other => self.pending = other,
            }
        }

        Ok(entry)
    }
}

fn truncated_on_eof(e: std::io::Error) -> ManifestError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ManifestError::Truncated
    } else {
        ManifestError::Io(e)
    }
}

impl<R> ManifestReader for ManioReader<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_entry(&mut self) -> Result<Option<ManifestEntry>, ManifestError> {
        let mut datapth = None;
        loop {
            let Some(rec) = self.read_record().await? else {
                if datapth.is_some() {
                    return Err(ManifestError::Truncated);
                }
                return Ok(None);
            };
            match rec.cmd {
                Command::Datapth => datapth = Some(rec.into_text()),
                Command::Sig if self.protocol == Protocol::V2 => continue,
                Command::EndFile if self.protocol == Protocol::V2 => {
                    return Ok(Some(ManifestEntry::endfile_marker(rec.into_text())));
                }
                Command::Attribs => {
                    let attribs = rec.into_text();
                    let stat = Stat::decode(&attribs)?;
                    return self.finish_entry(stat, datapth).await.map(Some);
                }
                other => {
                    return Err(ManifestError::UnexpectedCommand {
                        found: other.as_char(),
                        expected: "attributes",
                    })
                }
            }
        }
    }
}
