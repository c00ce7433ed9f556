// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZIP bundling for operations that emit several files.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{EngineError, EngineResult};

/// Pack `(name, bytes)` entries into a deflated ZIP archive, in order.
pub fn bundle(entries: &[(String, Vec<u8>)]) -> EngineResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options)?;
        writer
            .write_all(bytes)
            .map_err(|err| EngineError::Archive(format!("writing {name}: {err}")))?;
    }

    let output = writer.finish()?.into_inner();
    debug!(entries = entries.len(), bytes = output.len(), "Archive built");
    Ok(output)
}
