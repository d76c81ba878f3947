//! End-to-end scenarios against a register-file bus.
//!
//! The bus here echoes writes back on reads, like a module whose registers
//! are plain memory. Every test drives the public API only.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use ac020::transport::COMMAND_BUFFER;
use ac020::validation::{validate_command_frame, validate_command_sequence};
use ac020::{
    AccessRequest, AccessResponse, Ac020, Bus, BusError, CommandKind, FormatWhich, Mode,
    NegotiatedFormat, Operation, PixelEncoding, RegisterRequest, SensorConfig, SensorError,
    SensorSubdevice, StreamState,
};

const ADDRESS: u8 = 0x3C;

const PAL_START: [u8; 28] = [
    0x01, 0x30, 0xC1, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A, 0x00, 0xFF,
    0x25, 0x89, 0x63, 0x00, 0x10, 0x00, 0x1E, 0xD0, 0x02, 0x40, 0x02, 0x00, 0x18,
];

const PAL_STOP: [u8; 28] = [
    0x01, 0x30, 0xC2, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A, 0x00, 0x9B,
    0x5A, 0xBC, 0xA6, 0x01, 0x10, 0x00, 0x1E, 0xD0, 0x02, 0x40, 0x02, 0x00, 0x19,
];

#[derive(Default)]
struct Memory {
    cells: Vec<u8>,
    commands: Vec<Vec<u8>>,
    transfers: usize,
    broken: bool,
}

/// Register file shared between tests and the sensor.
#[derive(Clone, Default)]
struct EchoBus {
    memory: Arc<Mutex<Memory>>,
}

impl EchoBus {
    fn memory(&self) -> std::sync::MutexGuard<'_, Memory> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn commands(&self) -> Vec<Vec<u8>> {
        self.memory().commands.clone()
    }

    fn transfers(&self) -> usize {
        self.memory().transfers
    }

    fn set_broken(&self, broken: bool) {
        self.memory().broken = broken;
    }
}

impl Bus for EchoBus {
    fn transfer(&self, _address: u8, operations: &mut [Operation<'_>]) -> Result<(), BusError> {
        let mut memory = self.memory();
        memory.transfers += 1;
        if memory.broken {
            return Err(BusError::NoAcknowledge);
        }

        let mut pointer = 0usize;
        for operation in operations.iter_mut() {
            match operation {
                Operation::Write(bytes) => {
                    let Some((address, payload)) = bytes.split_first_chunk::<2>() else {
                        continue;
                    };
                    pointer = usize::from(u16::from_be_bytes(*address));
                    if pointer == usize::from(COMMAND_BUFFER) {
                        memory.commands.push(payload.to_vec());
                    }
                    let end = pointer + payload.len();
                    if memory.cells.len() < end {
                        memory.cells.resize(end, 0);
                    }
                    if let Some(cells) = memory.cells.get_mut(pointer..end) {
                        cells.copy_from_slice(payload);
                    }
                    pointer = end;
                }
                Operation::Read(buffer) => {
                    for byte in buffer.iter_mut() {
                        *byte = memory.cells.get(pointer).copied().unwrap_or(0);
                        pointer += 1;
                    }
                }
            }
        }
        Ok(())
    }
}

fn sensor_with(config: SensorConfig) -> (Ac020<EchoBus>, EchoBus) {
    let bus = EchoBus::default();
    (Ac020::new(bus.clone(), ADDRESS, config), bus)
}

#[test]
fn test_pal_start_stop_scenario() {
    let (sensor, bus) = sensor_with(SensorConfig::with_mode(Mode::Wn640Bt656Pal));

    let format = sensor
        .set_format(
            &NegotiatedFormat::new(720, 576, PixelEncoding::Uyvy8_2x8),
            FormatWhich::Active,
        )
        .expect("idle sensor accepts formats");
    assert_eq!((format.width, format.height), (720, 576));

    sensor.set_streaming(true).expect("start should succeed");
    assert_eq!(sensor.stream_state(), StreamState::Streaming);
    sensor.set_streaming(false).expect("stop should succeed");
    assert_eq!(sensor.stream_state(), StreamState::Idle);

    let commands = bus.commands();
    assert_eq!(commands, vec![PAL_START.to_vec(), PAL_STOP.to_vec()]);
    let frames = commands.iter().map(Vec::as_slice);
    assert_eq!(validate_command_sequence(frames).expect("valid traffic"), 2);
}

#[test]
fn test_best_match_drives_command_size() {
    let (sensor, bus) = sensor_with(SensorConfig::with_mode(Mode::Wn640Bt656Ntsc));

    let format = sensor
        .set_format(
            &NegotiatedFormat::new(700, 500, PixelEncoding::Yuyv8_2x8),
            FormatWhich::Active,
        )
        .expect("idle sensor accepts formats");
    assert_eq!((format.width, format.height), (720, 486));
    assert_eq!(format.encoding, PixelEncoding::Uyvy8_2x8);

    sensor.set_streaming(true).expect("start should succeed");
    let commands = bus.commands();
    let frame = validate_command_frame(&commands[0]).expect("start frame is valid");
    assert_eq!(frame.kind(), Some(CommandKind::Start));
    assert_eq!((frame.width(), frame.height()), (720, 486));
    assert_eq!(frame.sync_byte(), 0x19);
}

#[test]
fn test_repeated_calls_send_one_command_each() {
    let (sensor, bus) = sensor_with(SensorConfig::with_mode(Mode::Wn384Dvp));

    for _ in 0..3 {
        sensor.set_streaming(true).expect("start should succeed");
    }
    for _ in 0..3 {
        sensor.set_streaming(false).expect("stop should succeed");
    }
    assert_eq!(bus.commands().len(), 2);
}

#[test]
fn test_concurrent_starts_send_one_command() {
    let (sensor, bus) = sensor_with(SensorConfig::with_mode(Mode::Wn640Dvp));
    let sensor = Arc::new(sensor);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let sensor = Arc::clone(&sensor);
            thread::spawn(move || sensor.start_streaming())
        })
        .collect();
    for handle in handles {
        handle
            .join()
            .expect("thread should not panic")
            .expect("start should succeed");
    }

    assert_eq!(bus.commands().len(), 1);
    assert_eq!(sensor.stream_state(), StreamState::Streaming);
}

#[test]
fn test_format_change_refused_while_streaming() {
    let (sensor, _bus) = sensor_with(SensorConfig::with_mode(Mode::Wn640Bt656Pal));
    sensor.set_streaming(true).expect("start should succeed");

    let result = sensor.set_format(
        &NegotiatedFormat::new(1280, 1024, PixelEncoding::Uyvy8_2x8),
        FormatWhich::Active,
    );
    assert!(matches!(result, Err(SensorError::Busy)));
    assert_eq!(sensor.format(FormatWhich::Active).width, 720);
    assert_eq!(sensor.stream_state(), StreamState::Streaming);
}

#[test]
fn test_broken_bus_then_recovery() {
    let (sensor, bus) = sensor_with(SensorConfig::with_mode(Mode::Wn640Bt656Pal));

    bus.set_broken(true);
    let error = sensor
        .set_streaming(true)
        .expect_err("start fails on a broken bus");
    assert!(matches!(
        error,
        SensorError::Device {
            command: CommandKind::Start,
            ..
        }
    ));
    assert_eq!(sensor.stream_state(), StreamState::Idle);

    bus.set_broken(false);
    sensor.set_streaming(true).expect("start should succeed");
    assert_eq!(bus.commands().len(), 1);
}

#[test]
fn test_exempt_modes_are_silent() {
    for mode in [Mode::Gl1280Bt1120, Mode::Gl1280Dvp] {
        let (sensor, bus) = sensor_with(SensorConfig::with_mode(mode));
        sensor.set_streaming(true).expect("exempt start succeeds");
        sensor.set_streaming(false).expect("exempt stop succeeds");
        assert_eq!(bus.transfers(), 0, "{mode} should not touch the bus");
    }
}

#[test]
fn test_register_round_trip_through_access() {
    let (sensor, bus) = sensor_with(SensorConfig::default());

    let data = [0x11, 0x22, 0x33, 0x44, 0x55];
    let written = sensor
        .access(AccessRequest::Set {
            request: RegisterRequest::new(0x0500, 5),
            data: Some(&data),
        })
        .expect("set should succeed");
    assert_eq!(written, AccessResponse::Written(5));

    let mut buffer = [0u8; 5];
    let read = sensor
        .access(AccessRequest::Get {
            request: RegisterRequest::new(0x0500, 5),
            buffer: Some(&mut buffer),
        })
        .expect("get should succeed");
    assert_eq!(read, AccessResponse::Read(5));
    assert_eq!(buffer, data);

    let before = bus.transfers();
    let rejected = sensor.gateway().get_registers(0x0500, 0);
    assert!(matches!(rejected, Err(SensorError::InvalidArgument(_))));
    assert_eq!(bus.transfers(), before);
}

#[test]
fn test_config_file_drives_frames() {
    let config = SensorConfig::from_toml_str(
        r#"
        mode = "wn640_bt656_pal_progressive"
        frame_rate = 25
        "#,
    )
    .expect("config should parse");
    let (sensor, bus) = sensor_with(config);

    sensor.set_streaming(true).expect("start should succeed");
    let commands = bus.commands();
    let frame = validate_command_frame(&commands[0]).expect("start frame is valid");
    assert_eq!(frame.frame_rate(), 25);
    assert_eq!(frame.sync_byte(), 0x28);
    assert_eq!((frame.width(), frame.height()), (720, 576));
}
