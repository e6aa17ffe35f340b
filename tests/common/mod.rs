//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common test utilities

use std::env;
use std::sync::Mutex;

use lazy_static::lazy_static;
use log::LevelFilter;
use rand::distributions::{Distribution, Standard};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use chatrtc::common::{CallConfig, DeviceKind, RemoteParticipant};
use chatrtc::core::call_manager::CallManager;
use chatrtc::sim::sim_platform::{SimDevices, SimMedia, SimPlatform};

macro_rules! error_line {
    () => {
        concat!(module_path!(), ":", line!())
    };
}

pub struct Prng {
    seed: u64,
    rng: Mutex<Option<ChaCha20Rng>>,
}

impl Prng {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: Mutex::new(None),
        }
    }

    // Use a freshly seeded PRNG for each test
    pub fn init(&self) {
        let mut opt = self.rng.lock().unwrap();
        let _ = opt.replace(ChaCha20Rng::seed_from_u64(self.seed));
    }

    pub fn gen<T>(&self) -> T
    where
        Standard: Distribution<T>,
    {
        self.rng.lock().unwrap().as_mut().unwrap().gen::<T>()
    }
}

lazy_static! {
    pub static ref PRNG: Prng = {
        let rand_seed = match env::var("RANDOM_SEED") {
            Ok(v) => v.parse().unwrap(),
            Err(_) => 0,
        };

        println!("\n*** Using random seed: {}", rand_seed);
        Prng::new(rand_seed)
    };
}

pub fn test_init() {
    let log_level = if env::var("DEBUG_TESTS").is_ok() {
        LevelFilter::Info
    } else {
        LevelFilter::Error
    };
    let _ = env_logger::builder()
        .filter_level(log_level)
        .is_test(true)
        .try_init();

    PRNG.init();
}

pub fn random_remote() -> RemoteParticipant {
    RemoteParticipant::new(
        format!("REMOTE_PEER-{}", PRNG.gen::<u16>()),
        format!("Remote {}", PRNG.gen::<u16>()),
        None,
    )
}

pub struct TestContext {
    cm: CallManager<SimPlatform>,
    platform: SimPlatform,
    devices: SimDevices,
    media: SimMedia,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        info!("Dropping TestContext");
        self.cm.close();
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::build(
            CallConfig::default(),
            SimDevices::with_granted(&[DeviceKind::Microphone, DeviceKind::Camera]),
        )
    }

    pub fn with_config(config: CallConfig) -> Self {
        Self::build(
            config,
            SimDevices::with_granted(&[DeviceKind::Microphone, DeviceKind::Camera]),
        )
    }

    pub fn with_devices(devices: SimDevices) -> Self {
        Self::build(CallConfig::default(), devices)
    }

    fn build(config: CallConfig, devices: SimDevices) -> Self {
        let platform = SimPlatform::new();
        let media = SimMedia::new();
        let cm = CallManager::new(
            platform.clone(),
            Box::new(devices.clone()),
            Box::new(media.clone()),
            config,
        );
        Self {
            cm,
            platform,
            devices,
            media,
        }
    }

    pub fn cm(&self) -> CallManager<SimPlatform> {
        self.cm.clone()
    }

    pub fn platform(&self) -> &SimPlatform {
        &self.platform
    }

    pub fn devices(&self) -> &SimDevices {
        &self.devices
    }

    pub fn media(&self) -> &SimMedia {
        &self.media
    }
}
