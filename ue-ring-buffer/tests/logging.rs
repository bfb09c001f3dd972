//! Checks that the ring buffer reports through the `log` facade.


use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};
use ue_ring_buffer::RingBuffer;


struct CapturingLogger {
    records: Mutex<Vec<(Level, String)>>,
}
impl Log for CapturingLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records.lock().unwrap()
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {
    }
}

static LOGGER: CapturingLogger = CapturingLogger {
    records: Mutex::new(Vec::new()),
};


#[test]
fn test_records() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let mut storage = [0u8; 3];
    let mut buf = RingBuffer::new(&mut storage);
    assert_eq!(buf.push(1), true);
    assert_eq!(buf.push(2), true);
    assert_eq!(buf.push(3), false);
    assert_eq!(buf.pop(), Some(1));
    assert_eq!(buf.pop(), Some(2));
    assert_eq!(buf.pop(), None);
    buf.reset();

    let records = LOGGER.records.lock().unwrap().clone();
    assert_eq!(
        records,
        vec![
            (Level::Debug, "ring buffer initialized with capacity 2".to_owned()),
            (Level::Trace, "ring buffer of capacity 2 full; dropping byte".to_owned()),
            (Level::Debug, "ring buffer of capacity 2 reset".to_owned()),
        ],
    );
}
