//! Router lifecycle and end-to-end pipeline tests against in-memory devices.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use channel_router::audio::mock::{Journal, MockDevice};
use channel_router::{
    switch_listener, ErrorKind, Router, RouterConfig, RouterError, RouterState, StereoChannel,
    StreamFormat, TimerMode,
};

fn manual_config(secs: u64) -> RouterConfig {
    RouterConfig::from_secs(secs).with_timer(TimerMode::Manual)
}

fn stereo(name: &str, rate: u32) -> MockDevice {
    MockDevice::new(name, StreamFormat::stereo_f32(rate))
}

#[test]
fn test_interval_flips_once_per_period() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
    router.start().unwrap();
    let clock = router.manual_clock().unwrap();

    assert_eq!(router.active_channel(), StereoChannel::Left);

    clock.advance(Duration::from_secs(1));
    assert_eq!(router.active_channel(), StereoChannel::Right);

    clock.advance(Duration::from_secs(1));
    assert_eq!(router.active_channel(), StereoChannel::Left);
}

#[test]
fn test_no_flip_before_full_interval() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(5)).unwrap();
    router.start().unwrap();

    router.manual_clock().unwrap().advance(Duration::from_millis(4999));
    assert_eq!(router.active_channel(), StereoChannel::Left);
}

#[test]
fn test_listener_sees_every_flip() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let listener = switch_listener(move |e| sink.lock().unwrap().push(e.channel));

    let mut router = Router::with_listener(&source, &target, manual_config(2), listener).unwrap();
    router.start().unwrap();
    router.manual_clock().unwrap().advance(Duration::from_secs(6));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![StereoChannel::Right, StereoChannel::Left, StereoChannel::Right]
    );
}

#[test]
fn test_audio_flows_with_active_channel_only() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
    router.start().unwrap();

    let played: Vec<f32> = (1..=10).map(|i| i as f32).collect();
    assert_eq!(source.push(&played), 10);

    let mut out = [0.0; 10];
    assert_eq!(target.pull(&mut out), 10);
    assert_eq!(out, [1.0, 0.0, 3.0, 0.0, 5.0, 0.0, 7.0, 0.0, 9.0, 0.0]);

    router.manual_clock().unwrap().advance(Duration::from_secs(1));
    source.push(&played);
    assert_eq!(target.pull(&mut out), 10);
    assert_eq!(out, [0.0, 2.0, 0.0, 4.0, 0.0, 6.0, 0.0, 8.0, 0.0, 10.0]);
}

#[test]
fn test_resampled_pipeline_keeps_muted_side_silent() {
    let source = stereo("Speakers", 44100);
    let target = MockDevice::new("USB DAC", StreamFormat::new(48000, 2, cpal::SampleFormat::I16));
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
    router.start().unwrap();

    let block: Vec<f32> = [0.5, 0.5].repeat(4410);
    let mut out = vec![0.0; 4096];
    let mut rendered = Vec::new();
    for _ in 0..4 {
        source.push(&block);
        let n = target.pull(&mut out);
        rendered.extend_from_slice(&out[..n]);
    }

    assert!(!rendered.is_empty());
    assert_eq!(rendered.len() % 2, 0);
    assert!(rendered.iter().skip(1).step_by(2).all(|s| s.abs() < 1e-3));
    assert_eq!(router.target_format().sample_rate, 48000);
}

#[test]
fn test_dispose_twice() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
    router.start().unwrap();

    router.dispose();
    router.dispose();
    assert_eq!(router.state(), RouterState::Disposed);
    assert!(!source.is_capturing());
    assert!(!target.has_render_stream());
}

#[test]
fn test_dispose_without_start() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();

    router.dispose();
    assert_eq!(router.state(), RouterState::Disposed);
}

#[test]
fn test_no_flip_after_dispose() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
    router.start().unwrap();
    let clock = router.manual_clock().unwrap();

    router.dispose();
    assert!(!clock.advance(Duration::from_secs(10)));
    assert_eq!(router.active_channel(), StereoChannel::Left);
}

#[test]
fn test_start_twice_rejected() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let journal = Journal::new();
    let source = source.with_journal(journal.clone());
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();

    router.start().unwrap();
    let err = router.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Lifecycle);
    // The device was only started once
    assert_eq!(journal.entries(), vec!["Speakers:capture:play"]);
}

#[test]
fn test_start_after_dispose_rejected() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
    router.dispose();

    assert!(matches!(
        router.start(),
        Err(RouterError::InvalidState { operation: "start", .. })
    ));
}

#[test]
fn test_restart_does_not_replay_old_audio() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();

    router.start().unwrap();
    source.push(&[9.0, 9.0, 9.0, 9.0]);
    router.stop().unwrap();
    router.start().unwrap();
    source.push(&[1.0, 2.0, 3.0, 4.0]);

    let mut out = [0.0; 8];
    assert_eq!(target.pull(&mut out), 4);
    assert_eq!(&out[..4], &[1.0, 0.0, 3.0, 0.0]);
}

#[test]
fn test_failed_play_rolls_back_capture() {
    let journal = Journal::new();
    let source = stereo("src", 48000).with_journal(journal.clone());
    let target = stereo("dst", 48000).failing_play();
    let mut router = Router::new(&source, &target, manual_config(1)).unwrap();

    let err = router.start().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Device);
    assert_eq!(router.state(), RouterState::Constructed);
    assert!(!source.is_capturing());
    assert!(!target.is_rendering());
    assert_eq!(journal.entries(), vec!["src:capture:play", "src:capture:pause"]);
}

#[test]
fn test_dispose_while_pulling() {
    for _ in 0..20 {
        let source = stereo("Speakers", 44100);
        let target = stereo("Headphones", 48000);
        let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
        router.start().unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let pulls = Arc::new(AtomicUsize::new(0));
        let callback = {
            let (source, target) = (source.clone(), target.clone());
            let (done, pulls) = (Arc::clone(&done), Arc::clone(&pulls));
            thread::spawn(move || {
                let block: Vec<f32> = [0.5, -0.5].repeat(441);
                let mut out = vec![0.0; 960];
                while !done.load(Ordering::SeqCst) {
                    source.push(&block);
                    target.pull(&mut out);
                    pulls.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        while pulls.load(Ordering::SeqCst) < 3 {
            thread::yield_now();
        }
        router.dispose();
        done.store(true, Ordering::SeqCst);

        callback.join().unwrap();
        assert_eq!(router.state(), RouterState::Disposed);
        assert!(!target.has_render_stream());
        assert!(!source.is_capturing());
    }
}

#[test]
fn test_target_without_mix_format() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Broken", 48000).without_mix_format();

    let err = Router::new(&source, &target, manual_config(1)).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(!source.is_capturing());
    assert!(!target.has_render_stream());
}

#[test]
fn test_drop_disposes() {
    let source = stereo("Speakers", 48000);
    let target = stereo("Headphones", 48000);
    {
        let mut router = Router::new(&source, &target, manual_config(1)).unwrap();
        router.start().unwrap();
        assert!(target.is_rendering());
    }
    assert!(!source.is_capturing());
    assert!(!target.has_render_stream());
}

#[test]
#[ignore = "requires audio hardware with loopback support"]
fn test_default_device_loopback() {
    let device = channel_router::CpalDevice::default_output().unwrap();
    let mut router = Router::new(&device, &device, RouterConfig::from_secs(1)).unwrap();
    router.start().unwrap();
    std::thread::sleep(Duration::from_millis(2500));
    router.dispose();
}
