use log::{debug, warn};
use shared::Prediction;
use std::io::ErrorKind;
use std::path::Path;

/// Parses `filename,label,confidence` rows.
///
/// The detector writes no header, but a first row whose confidence column is
/// not a number is taken to be one and skipped.
pub fn parse_predictions(text: &str) -> Vec<Prediction> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut predictions = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!("Skipping unreadable predictions row {}: {}", index + 1, e);
                continue;
            }
        };
        let (Some(filename), Some(label), Some(raw_confidence)) =
            (record.get(0), record.get(1), record.get(2))
        else {
            warn!("Skipping predictions row {} with {} columns", index + 1, record.len());
            continue;
        };
        let confidence = match raw_confidence.parse::<f32>() {
            Ok(value) => value,
            Err(_) if index == 0 => {
                debug!("Skipping predictions header: {:?}", record);
                continue;
            }
            Err(_) => {
                warn!("Unparsable confidence `{}` on row {}", raw_confidence, index + 1);
                f32::NAN
            }
        };
        predictions.push(Prediction {
            filename: filename.to_string(),
            label: label.to_string(),
            confidence,
        });
    }

    predictions
}

pub fn labels(predictions: &[Prediction]) -> Vec<String> {
    predictions.iter().map(|p| p.label.clone()).collect()
}

/// Reads and deletes the predictions file. A missing file means nothing was detected.
pub async fn consume(path: &Path) -> std::io::Result<Vec<Prediction>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("No predictions file at {}", path.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };
    let predictions = parse_predictions(&text);
    tokio::fs::remove_file(path).await?;
    Ok(predictions)
}
