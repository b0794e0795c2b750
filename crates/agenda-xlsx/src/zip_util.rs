use std::io::Read;

use zip::read::ZipFile;

use crate::XlsxError;

/// Default cap on the inflated size of any single part.
///
/// Agenda templates are a few hundred KiB; anything near this size is a ZIP bomb or
/// forged metadata.
pub(crate) const DEFAULT_MAX_PART_BYTES: u64 = 64 * 1024 * 1024; // 64MiB

/// Default cap on the inflated size of the whole package.
pub(crate) const DEFAULT_MAX_TOTAL_BYTES: u64 = 128 * 1024 * 1024; // 128MiB

/// Running total of inflated bytes across one package load.
pub(crate) struct ZipInflateBudget {
    max_total_bytes: u64,
    used_bytes: u64,
}

impl ZipInflateBudget {
    pub(crate) fn new(max_total_bytes: u64) -> Self {
        Self {
            max_total_bytes,
            used_bytes: 0,
        }
    }

    fn remaining_bytes(&self) -> u64 {
        self.max_total_bytes.saturating_sub(self.used_bytes)
    }

    fn too_large(&self, extra: u64) -> XlsxError {
        XlsxError::PackageTooLarge {
            total: self.used_bytes.saturating_add(extra),
            max: self.max_total_bytes,
        }
    }

    fn consume(&mut self, bytes: u64) -> Result<(), XlsxError> {
        if bytes > self.remaining_bytes() {
            return Err(self.too_large(bytes));
        }
        self.used_bytes += bytes;
        Ok(())
    }
}

/// Inflate one ZIP entry, enforcing both the per-part limit and the shared budget.
///
/// The declared uncompressed size is checked first, but never trusted: reads are capped
/// at `limit + 1` bytes so forged size fields are still caught.
pub(crate) fn read_zip_file_bytes_with_budget<R: Read>(
    file: &mut ZipFile<'_, R>,
    part: &str,
    max_part_bytes: u64,
    budget: &mut ZipInflateBudget,
) -> Result<Vec<u8>, XlsxError> {
    let part_too_large = |size: u64| XlsxError::PartTooLarge {
        part: part.to_string(),
        size,
        max: max_part_bytes,
    };

    let declared = file.size();
    if declared > max_part_bytes {
        return Err(part_too_large(declared));
    }
    if declared > budget.remaining_bytes() {
        return Err(budget.too_large(declared));
    }

    let limit = max_part_bytes.min(budget.remaining_bytes());
    let mut buf = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut buf)?;

    let observed = buf.len() as u64;
    if observed > max_part_bytes {
        return Err(part_too_large(observed));
    }
    budget.consume(observed)?;
    Ok(buf)
}

/// Compare OPC part names the way Excel resolves them: ASCII case-insensitive, `\`
/// treated as `/`, leading separators ignored.
pub(crate) fn zip_part_names_equivalent(a: &str, b: &str) -> bool {
    fn normalized(name: &str) -> impl Iterator<Item = u8> + '_ {
        name.bytes()
            .map(|b| if b == b'\\' { b'/' } else { b.to_ascii_lowercase() })
            .skip_while(|b| *b == b'/')
    }
    normalized(a).eq(normalized(b))
}
