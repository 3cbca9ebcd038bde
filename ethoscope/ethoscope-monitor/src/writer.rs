use std::{fs::File, io::Write, path::Path};

use ethoscope_types::{DataPoint, Roi};

use crate::{Error, Frame, Result};

/// Receives the points of every ROI on every frame where there are any.
pub trait ResultWriter {
    fn write(&mut self, t_ms: u64, roi: &Roi, points: &[DataPoint]) -> Result<()>;

    /// Called once per frame, after every ROI was written.
    fn flush(&mut self, t_ms: u64, frame: &Frame) -> Result<()>;

    /// Called once when the run ends, whatever the reason.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One CSV row per point: `t`, `roi_idx`, `roi_value`, then the variables.
///
/// The columns are fixed by the first point written.
pub struct CsvResultWriter<W: Write> {
    wtr: csv::Writer<W>,
    schema: Option<Vec<&'static str>>,
}

impl CsvResultWriter<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> CsvResultWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            wtr: csv::Writer::from_writer(writer),
            schema: None,
        }
    }

    pub fn into_inner(self) -> Result<W> {
        self.wtr
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}

impl<W: Write> ResultWriter for CsvResultWriter<W> {
    fn write(&mut self, t_ms: u64, roi: &Roi, points: &[DataPoint]) -> Result<()> {
        for point in points {
            let found: Vec<&'static str> = point.variables().iter().map(|v| v.header_name()).collect();
            match &self.schema {
                Some(expected) if *expected != found => {
                    return Err(Error::SchemaMismatch {
                        roi: roi.idx(),
                        expected: expected.clone(),
                        found,
                    });
                }
                Some(_) => {}
                None => {
                    let mut header = vec!["t", "roi_idx", "roi_value"];
                    header.extend(found.iter().copied());
                    self.wtr.write_record(&header)?;
                    self.schema = Some(found);
                }
            }
            let mut record = vec![
                t_ms.to_string(),
                roi.idx().to_string(),
                roi.value().to_string(),
            ];
            record.extend(point.variables().iter().map(|v| v.value.to_string()));
            self.wtr.write_record(&record)?;
        }
        Ok(())
    }

    fn flush(&mut self, _t_ms: u64, _frame: &Frame) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.wtr.flush()?;
        Ok(())
    }
}

/// Write the position and size of every ROI as CSV.
pub fn write_roi_map<W: Write>(writer: W, rois: &[Roi]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for roi in rois {
        wtr.serialize(roi.get_feature_dict())?;
    }
    wtr.flush()?;
    Ok(())
}
