//! Bus controller fakes shared by the driver tests

use std::borrow::ToOwned;
use std::boxed::Box;
use std::panic::{self, UnwindSafe};
use std::string::String;
use std::sync::{Arc, Mutex};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use picolib_hal::spi::{Mode, SpiConfig};
use picolib_hal::{DeviceSelector, I2cController, Operation, Response, SpiController};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cEvent {
    Start,
    RepeatedStart,
    Stop,
    Address(u8, Operation),
    Read(Response),
    Write(u8),
}

/// I2C controller that records every primitive and plays back read data
#[derive(Default)]
pub struct ScriptedI2c {
    pub events: Vec<I2cEvent>,
    pub reads: VecDeque<u8>,
    /// Addresses that acknowledge; every other address NACKs
    pub present: Vec<u8>,
    /// Data bytes that are NACKed
    pub rejected: Vec<u8>,
}

impl ScriptedI2c {
    pub fn with_device(address: u8) -> Self {
        Self {
            present: std::vec![address],
            ..Self::default()
        }
    }
}

impl I2cController for ScriptedI2c {
    fn initialize(&mut self) {}

    fn bus_error_present(&self) -> bool {
        false
    }

    fn start(&mut self) {
        self.events.push(I2cEvent::Start);
    }

    fn repeated_start(&mut self) {
        self.events.push(I2cEvent::RepeatedStart);
    }

    fn stop(&mut self) {
        self.events.push(I2cEvent::Stop);
    }

    fn address(&mut self, address: u8, operation: Operation) -> Response {
        self.events.push(I2cEvent::Address(address, operation));
        if self.present.contains(&address) {
            Response::Ack
        } else {
            Response::Nack
        }
    }

    fn read(&mut self, response: Response) -> u8 {
        self.events.push(I2cEvent::Read(response));
        self.reads.pop_front().unwrap_or(0)
    }

    fn write(&mut self, data: u8) -> Response {
        self.events.push(I2cEvent::Write(data));
        if self.rejected.contains(&data) {
            Response::Nack
        } else {
            Response::Ack
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiEvent {
    Initialize,
    Configure(Mode),
    Select,
    Deselect,
    Exchange(u8),
}

pub type SpiLog = Rc<RefCell<Vec<SpiEvent>>>;

/// SPI controller that records every byte and plays back responses
pub struct RecordingSpi {
    pub log: SpiLog,
    pub responses: VecDeque<u8>,
}

impl RecordingSpi {
    pub fn new(log: &SpiLog) -> Self {
        Self {
            log: Rc::clone(log),
            responses: VecDeque::new(),
        }
    }
}

impl SpiController for RecordingSpi {
    type Configuration = SpiConfig;

    fn initialize(&mut self) {
        self.log.borrow_mut().push(SpiEvent::Initialize);
    }

    fn configure(&mut self, configuration: &SpiConfig) {
        self.log
            .borrow_mut()
            .push(SpiEvent::Configure(configuration.mode()));
    }

    fn exchange(&mut self, data: u8) -> u8 {
        self.log.borrow_mut().push(SpiEvent::Exchange(data));
        self.responses.pop_front().unwrap_or(0)
    }
}

pub struct RecordingSelector {
    pub log: SpiLog,
}

impl RecordingSelector {
    pub fn new(log: &SpiLog) -> Self {
        Self {
            log: Rc::clone(log),
        }
    }
}

impl DeviceSelector for RecordingSelector {
    fn select(&mut self) {
        self.log.borrow_mut().push(SpiEvent::Select);
    }

    fn deselect(&mut self) {
        self.log.borrow_mut().push(SpiEvent::Deselect);
    }
}

/// Bytes sent on the bus, in order
pub fn transmitted(log: &SpiLog) -> Vec<u8> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            SpiEvent::Exchange(byte) => Some(*byte),
            _ => None,
        })
        .collect()
}

/// Source file reported by the panic that `f` raises
///
/// Hook swaps are serialized so concurrent callers keep their own hook.
pub fn trap_location(f: impl FnOnce() + UnwindSafe) -> Option<String> {
    static HOOK: Mutex<()> = Mutex::new(());
    let _serialized = HOOK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let location = Arc::new(Mutex::new(None));
    let recorded = Arc::clone(&location);
    let thread = std::thread::current().id();
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if std::thread::current().id() == thread {
            if let Some(at) = info.location() {
                *recorded.lock().unwrap() = Some(at.file().to_owned());
            }
        }
    }));
    let result = panic::catch_unwind(f);
    panic::set_hook(previous);

    assert!(result.is_err(), "no trap");
    let file = location.lock().unwrap().take();
    file
}
