use std::{
    collections::{BTreeMap, VecDeque},
    time::Duration,
};

use chrono::NaiveDateTime;
use ethoscope_hardware::{HardwareConfig, HardwareConnection};
use ethoscope_monitor::{
    CsvResultWriter, Drawer, Error, Frame, FrameGrabber, FrameSource, ImageDirectoryGrabber, Monitor,
    ResultWriter, SnapshotDrawer, ThreadedFrameSource, TrackingUnit, write_roi_map,
};
use ethoscope_stimulators::StimulatorConfig;
use ethoscope_tracker::TrackerConfig;
use ethoscope_types::{DataPoint, Roi, Variable, VariableKind};
use image::{GrayImage, Luma};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

struct Frames(VecDeque<Frame>);

impl FrameSource for Frames {
    fn next_frame(&mut self) -> ethoscope_monitor::Result<Option<Frame>> {
        Ok(self.0.pop_front())
    }
}

fn start() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-03-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Two 100x60 ROIs side by side. From frame 1 on, a fly walks right in the
/// first one and a fly sits still in the second.
fn frames(n: u64) -> Frames {
    let frames = (0..n)
        .map(|i| {
            let mut image = GrayImage::from_pixel(200, 60, Luma([200]));
            if i > 0 {
                let x = 20 + 10 * i as i32;
                draw_filled_rect_mut(&mut image, Rect::at(x - 6, 28).of_size(12, 4), Luma([40]));
                draw_filled_rect_mut(&mut image, Rect::at(144, 28).of_size(12, 4), Luma([40]));
            }
            Frame {
                t_ms: i * 100,
                wall_clock: start() + chrono::TimeDelta::milliseconds(i as i64 * 100),
                image,
            }
        })
        .collect();
    Frames(frames)
}

fn rois() -> Vec<Roi> {
    vec![
        Roi::new(vec![(0, 0), (99, 0), (99, 59), (0, 59)], 1, None).unwrap(),
        Roi::new(vec![(100, 0), (199, 0), (199, 59), (100, 59)], 2, Some(7)).unwrap(),
    ]
}

fn units(with_stimulator: bool) -> Vec<TrackingUnit> {
    let tracker = TrackerConfig::default();
    rois()
        .into_iter()
        .map(|roi| {
            let stimulator = with_stimulator.then(|| StimulatorConfig::default().build().unwrap());
            TrackingUnit::new(roi, tracker.build(), tracker.history(), stimulator)
        })
        .collect()
}

#[test_log::test]
fn tracks_and_writes_every_roi() {
    let mut monitor = Monitor::new(Box::new(frames(6)), units(true)).unwrap();
    monitor.attach_hardware(HardwareConnection::open(HardwareConfig::Default, 4).unwrap());
    let mut writer = CsvResultWriter::new(Vec::new());
    monitor.run(&mut writer, None).unwrap();
    assert_eq!(monitor.frame_count(), 6);

    let csv = String::from_utf8(writer.into_inner().unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "t,roi_idx,roi_value,x,y,w,h,phi,xy_dist_log10x1000,m_log_lik,is_inferred,has_interacted"
    );
    // frame 0 only initialises the background
    assert_eq!(lines.len(), 1 + 2 * 5);
    assert!(lines[1].starts_with("100,1,1,"));
    assert!(lines[2].starts_with("100,2,7,"));
    assert!(lines[1..].iter().all(|l| l.ends_with(",0,0")));

    let last = monitor.last_positions();
    let x1 = last[&1][0].get(VariableKind::X).unwrap();
    let x2 = last[&2][0].get(VariableKind::X).unwrap();
    assert!((x1 - 70).abs() <= 2, "x1 {x1}");
    assert!((x2 - 150).abs() <= 2, "x2 {x2}");
}

#[test]
fn duplicate_rois_are_rejected() {
    let mut units = units(false);
    let tracker = TrackerConfig::default();
    units.push(TrackingUnit::new(rois().remove(0), tracker.build(), tracker.history(), None));
    assert!(matches!(
        Monitor::new(Box::new(frames(1)), units),
        Err(Error::DuplicateRoi(1))
    ));
}

#[test]
fn stopped_monitor_processes_nothing() {
    let mut monitor = Monitor::new(Box::new(frames(6)), units(false)).unwrap();
    monitor.stop_handle().stop();
    let mut writer = CsvResultWriter::new(Vec::new());
    monitor.run(&mut writer, None).unwrap();
    assert_eq!(monitor.frame_count(), 0);
    assert!(writer.into_inner().unwrap().is_empty());
}

#[test]
fn snapshot_is_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("last.jpg");
    let mut monitor = Monitor::new(Box::new(frames(3)), units(false)).unwrap();
    let mut writer = CsvResultWriter::new(Vec::new());
    let mut drawer = SnapshotDrawer::new(path.clone(), 1000);
    monitor.run(&mut writer, Some(&mut drawer)).unwrap();
    let snapshot = image::open(&path).unwrap();
    assert_eq!((snapshot.width(), snapshot.height()), (200, 60));
}

/// Keeps every position map it is asked to draw.
#[derive(Default)]
struct PositionLog(Vec<BTreeMap<u32, Vec<DataPoint>>>);

impl Drawer for PositionLog {
    fn draw(
        &mut self,
        _frame: &Frame,
        last_positions: &BTreeMap<u32, Vec<DataPoint>>,
        units: &[TrackingUnit],
    ) -> ethoscope_monitor::Result<()> {
        assert_eq!(last_positions.len(), units.len());
        self.0.push(last_positions.clone());
        Ok(())
    }
}

#[test]
fn drawer_gets_the_positions_of_every_roi() {
    let mut monitor = Monitor::new(Box::new(frames(3)), units(false)).unwrap();
    let mut writer = CsvResultWriter::new(Vec::new());
    let mut drawer = PositionLog::default();
    monitor.run(&mut writer, Some(&mut drawer)).unwrap();

    assert_eq!(drawer.0.len(), 3);
    let last = drawer.0.last().unwrap();
    assert_eq!(last, monitor.last_positions());
    let x1 = last[&1][0].get(VariableKind::X).unwrap();
    assert!((x1 - 40).abs() <= 2, "x1 {x1}");
}

#[test]
fn schema_changes_are_rejected() {
    let roi = &rois()[0];
    let mut writer = CsvResultWriter::new(Vec::new());
    let one = DataPoint::new([Variable::new(VariableKind::X, 1)]);
    let two = DataPoint::new([
        Variable::new(VariableKind::X, 1),
        Variable::new(VariableKind::Y, 2),
    ]);
    writer.write(0, roi, &[one]).unwrap();
    assert!(matches!(
        writer.write(1, roi, &[two]),
        Err(Error::SchemaMismatch { roi: 1, .. })
    ));
}

#[test]
fn roi_map_csv() {
    let mut buf = Vec::new();
    write_roi_map(&mut buf, &rois()).unwrap();
    let csv = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["x,y,w,h,value,idx", "0,0,100,60,1,1", "100,0,100,60,7,2"]);
}

struct Counter {
    n: u64,
    limit: u64,
    delay: Duration,
}

impl FrameGrabber for Counter {
    fn grab(&mut self) -> ethoscope_monitor::Result<Option<Frame>> {
        std::thread::sleep(self.delay);
        if self.n >= self.limit {
            return Ok(None);
        }
        self.n += 1;
        Ok(Some(Frame {
            t_ms: self.n,
            wall_clock: start(),
            image: GrayImage::new(4, 4),
        }))
    }
}

#[test]
fn threaded_source_ends_with_its_grabber() {
    let grabber = Counter {
        n: 0,
        limit: 3,
        delay: Duration::ZERO,
    };
    let mut source = ThreadedFrameSource::spawn(grabber, Duration::from_secs(5)).unwrap();
    let mut seen = Vec::new();
    while let Some(frame) = source.next_frame().unwrap() {
        seen.push(frame.t_ms);
    }
    assert_eq!(seen, vec![1, 2, 3]);
}

#[test]
fn slow_camera_times_out() {
    let grabber = Counter {
        n: 0,
        limit: 10,
        delay: Duration::from_millis(500),
    };
    let mut source = ThreadedFrameSource::spawn(grabber, Duration::from_millis(50)).unwrap();
    assert!(matches!(source.next_frame(), Err(Error::CameraTimeout(_))));
}

#[test]
fn image_directory_replay() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..3u8 {
        GrayImage::from_pixel(8, 6, Luma([i * 50]))
            .save(dir.path().join(format!("{i:03}.png")))
            .unwrap();
    }
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    let mut grabber = ImageDirectoryGrabber::new(dir.path(), 10.0).unwrap();
    assert_eq!(grabber.len(), 3);
    let mut frames = Vec::new();
    while let Some(frame) = grabber.grab().unwrap() {
        frames.push((frame.t_ms, frame.image.get_pixel(0, 0)[0]));
    }
    assert_eq!(frames, vec![(0, 0), (100, 50), (200, 100)]);

    let mut looping = ImageDirectoryGrabber::new(dir.path(), 10.0)
        .unwrap()
        .repeat(true)
        .max_frames(Some(5));
    let mut n = 0;
    while looping.grab().unwrap().is_some() {
        n += 1;
    }
    assert_eq!(n, 5);

    let empty = tempfile::tempdir().unwrap();
    assert!(matches!(
        ImageDirectoryGrabber::new(empty.path(), 10.0),
        Err(Error::NoImages(_))
    ));
}
