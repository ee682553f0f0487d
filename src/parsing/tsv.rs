use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use thiserror::Error;

use crate::core::transcript::CodingTranscript;
use crate::utils::validation::{
    check_transcript_limit, find_invalid_nucleotide, normalize_nucleotides, MAX_SEQUENCE_LENGTH,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid transcript table: {0}")]
    InvalidFormat(String),

    #[error("Too many transcripts: {0} exceeds maximum allowed (100000)")]
    TooManyTranscripts(usize),
}

/// Check if the path names a gzip-compressed table
pub fn is_gzipped(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

/// Delimiter implied by the file name: comma for `.csv`, tab otherwise
pub fn delimiter_for(path: &Path) -> char {
    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".csv") || name.ends_with(".csv.gz") {
        ','
    } else {
        '\t'
    }
}

/// Parse a transcript table file, plain or gzip-compressed
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read or decompressed, or the
/// errors of [`parse_tsv_text`].
pub fn parse_tsv_file(path: &Path) -> Result<Vec<CodingTranscript>, ParseError> {
    let content = if is_gzipped(path) {
        let mut decoder = GzDecoder::new(std::fs::File::open(path)?);
        let mut content = String::new();
        decoder.read_to_string(&mut content)?;
        content
    } else {
        std::fs::read_to_string(path)?
    };
    parse_tsv_text(&content, delimiter_for(path))
}

/// Parse a transcript table with columns: name, utr5_len, cds_len, utr3_len, sequence
///
/// A header line whose first field is `name` (or `transcript`, `id`) is
/// skipped, as are blank lines and `#` comments. Sequences are upper-cased
/// with T read as U, and the three region lengths must add up to the sequence
/// length.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` for short lines, bad lengths, invalid
/// bases, duplicate names or an empty table, or `ParseError::TooManyTranscripts`
/// if the limit is exceeded.
pub fn parse_tsv_text(text: &str, delimiter: char) -> Result<Vec<CodingTranscript>, ParseError> {
    let mut transcripts: Vec<CodingTranscript> = Vec::new();
    let mut first_data_line = true;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();

        if first_data_line {
            first_data_line = false;
            let first = fields.first().map(|s| s.to_lowercase()).unwrap_or_default();
            if first == "name" || first == "transcript" || first == "id" {
                continue;
            }
        }

        // Line numbers in errors are 1-based for user friendliness
        let line_num = i + 1;

        if fields.len() < 5 {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has fewer than 5 fields"
            )));
        }

        let name = fields[0].to_string();
        if name.is_empty() {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num} has an empty name"
            )));
        }
        if transcripts.iter().any(|t| t.name == name) {
            return Err(ParseError::InvalidFormat(format!(
                "Duplicate transcript '{name}' on line {line_num}"
            )));
        }

        let utr5 = parse_length(fields[1], "5'UTR", line_num)?;
        let cds = parse_length(fields[2], "CDS", line_num)?;
        let utr3 = parse_length(fields[3], "3'UTR", line_num)?;

        let sequence = normalize_nucleotides(fields[4]);
        if sequence.len() > MAX_SEQUENCE_LENGTH {
            return Err(ParseError::InvalidFormat(format!(
                "Sequence on line {line_num} exceeds {MAX_SEQUENCE_LENGTH} bases"
            )));
        }
        if let Some(symbol) = find_invalid_nucleotide(&sequence) {
            return Err(ParseError::InvalidFormat(format!(
                "Invalid base '{symbol}' in '{name}' on line {line_num}"
            )));
        }
        if utr5 + cds + utr3 != sequence.len() {
            return Err(ParseError::InvalidFormat(format!(
                "Region lengths of '{name}' sum to {} but the sequence has {} bases",
                utr5 + cds + utr3,
                sequence.len()
            )));
        }

        // Check transcript limit for DOS protection
        if check_transcript_limit(transcripts.len()).is_some() {
            return Err(ParseError::TooManyTranscripts(transcripts.len()));
        }

        transcripts.push(CodingTranscript::new(name, sequence, utr5, cds));
    }

    if transcripts.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No transcripts found in file".to_string(),
        ));
    }

    Ok(transcripts)
}

fn parse_length(field: &str, region: &str, line_num: usize) -> Result<usize, ParseError> {
    field.parse().map_err(|_| {
        ParseError::InvalidFormat(format!(
            "Invalid {region} length on line {line_num}: '{field}'"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::Transcript;
    use crate::core::types::RegionTag;
    use std::io::Write;

    #[test]
    fn test_parse_tsv_text() {
        let tsv = "name\tutr5_len\tcds_len\tutr3_len\tsequence
tx1\t2\t3\t4\tACAUGGCGU
tx2\t0\t0\t5\tggtta
";
        let transcripts = parse_tsv_text(tsv, '\t').unwrap();
        assert_eq!(transcripts.len(), 2);
        assert_eq!(transcripts[0].name, "tx1");
        assert_eq!(transcripts[0].region_of(1), Some(RegionTag::Utr5));
        assert_eq!(transcripts[0].region_of(2), Some(RegionTag::Cds));
        assert_eq!(transcripts[0].region_of(5), Some(RegionTag::Utr3));
        assert_eq!(transcripts[1].sequence, "GGUUA");
    }

    #[test]
    fn test_parse_csv_comments_before_header() {
        let csv = "# exported table
# second comment

transcript,utr5,cds,utr3,sequence
tx1,0,0,4,AACG
";
        let transcripts = parse_tsv_text(csv, ',').unwrap();
        assert_eq!(transcripts.len(), 1);
        assert_eq!(transcripts[0].utr3_length(), 4);
    }

    #[test]
    fn test_parse_tsv_no_header() {
        let tsv = "tx1\t0\t0\t4\tAACG\ntx2\t1\t0\t3\tGACG\n";
        assert_eq!(parse_tsv_text(tsv, '\t').unwrap().len(), 2);
    }

    #[test]
    fn test_length_mismatch() {
        let tsv = "tx1\t0\t0\t5\tAACG\n";
        let err = parse_tsv_text(tsv, '\t').unwrap_err();
        assert!(err.to_string().contains("sum to 5"));
    }

    #[test]
    fn test_invalid_base_and_short_line() {
        assert!(matches!(
            parse_tsv_text("tx1\t0\t0\t4\tANCG\n", '\t'),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_tsv_text("tx1\t0\t4\tAACG\n", '\t'),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_tsv_text("tx1\t0\tx\t4\tAACG\n", '\t'),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_duplicate_and_empty() {
        let tsv = "tx1\t0\t0\t4\tAACG\ntx1\t0\t0\t4\tAACG\n";
        assert!(parse_tsv_text(tsv, '\t').is_err());
        assert!(parse_tsv_text("# nothing\n", '\t').is_err());
    }

    #[test]
    fn test_parse_gzipped_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcripts.tsv.gz");
        let file = std::fs::File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"tx1\t0\t0\t4\tAACG\n").unwrap();
        encoder.finish().unwrap();

        assert!(is_gzipped(&path));
        let transcripts = parse_tsv_file(&path).unwrap();
        assert_eq!(transcripts[0].sequence, "AACG");
    }

    #[test]
    fn test_delimiter_for() {
        assert_eq!(delimiter_for(Path::new("a.csv")), ',');
        assert_eq!(delimiter_for(Path::new("a.CSV.gz")), ',');
        assert_eq!(delimiter_for(Path::new("a.tsv")), '\t');
    }
}
