//! End-to-end: the real symphonia decoder driven through the store's
//! public surface, against a generated wav fixture.

use std::path::Path;
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use wavecache::{AudioItem, AudioStore, StoreConfig, SymphoniaDecoder, TimeRange};

fn write_tone(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let total = (44_100.0 * seconds) as usize;
    for i in 0..total {
        let t = i as f32 / 44_100.0;
        let value = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
        writer
            .write_sample((value * i16::MAX as f32 * 0.5) as i16)
            .unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn test_store_decodes_real_file_and_serves_frames() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    write_tone(&path, 2.0);

    let mut store = AudioStore::new(StoreConfig::default(), Arc::new(SymphoniaDecoder));
    let item = AudioItem::new("tone", path.to_str().unwrap(), TimeRange::new(0, 2_000));
    store.set_items(vec![item], 1);

    for _ in 0..500 {
        if store.has_features("tone") {
            break;
        }
        sleep(Duration::from_millis(2));
    }
    assert!(store.has_features("tone"), "decode never completed");

    // One second in: a 440 Hz half-scale tone must register
    let vector = store.features_for_frame(30);
    assert_eq!(vector.len(), 512);
    let peak = vector.iter().fold(0.0f32, |acc, &v| acc.max(v));
    assert!(peak > 0.3, "expected audible signal, peak {peak}");

    // Past the display interval the item is silent
    assert_eq!(store.features_for_frame(90), vec![0.0; 512]);
}
