//! W5500 SPI driver

use core::cell::RefCell;

use picolib_hal::{DeviceSelector, SpiController};

use super::{Block, Driver};
use crate::spi::Device;

/// Read/write access bit of the control phase
const READ: u8 = 0b000;
const WRITE: u8 = 0b100;
/// Variable length data mode
const VDM: u8 = 0b00;

/// W5500 on an SPI bus, accessed in variable length data mode
pub struct SpiDriver<'a, A, C: SpiController, S> {
    device: Device<'a, A, C, S>,
}

impl<'a, A: FnMut(), C: SpiController, S: DeviceSelector> SpiDriver<'a, A, C, S> {
    pub fn new(
        aligner: A,
        controller: &'a RefCell<C>,
        configuration: C::Configuration,
        selector: S,
    ) -> Self {
        Self {
            device: Device::new(aligner, controller, configuration, selector),
        }
    }

    pub fn initialize(&mut self) {
        self.device.initialize();
    }

    pub fn device(&mut self) -> &mut Device<'a, A, C, S> {
        &mut self.device
    }

    fn header(block: Block, offset: u16, access: u8) -> [u8; 3] {
        let [high, low] = offset.to_be_bytes();
        [high, low, (block.select_bits() << 3) | access | VDM]
    }
}

impl<A: FnMut(), C: SpiController, S: DeviceSelector> Driver for SpiDriver<'_, A, C, S> {
    fn read(&mut self, block: Block, offset: u16, data: &mut [u8]) {
        let mut selection = self.device.select();
        selection.transmit_block(&Self::header(block, offset, READ));
        selection.receive_block(data);
    }

    fn write(&mut self, block: Block, offset: u16, data: &[u8]) {
        let mut selection = self.device.select();
        selection.transmit_block(&Self::header(block, offset, WRITE));
        selection.transmit_block(data);
    }
}
