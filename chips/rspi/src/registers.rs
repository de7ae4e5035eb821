// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register map and typed access for the RSPI register window.
//!
//! The three variants share one byte-addressed register file whose registers
//! are 8, 16 or 32 bits wide. Each register is named by a [`Register`]
//! descriptor that carries its offset, width and bitfield definitions, so a
//! value read from `STATUS` can only be tested against `SPSR` fields.
//!
//! The data register is deliberately absent from the public descriptors. Its
//! access width depends on how the data-control register was programmed, and
//! both are owned together by [`Registers`].

use core::cell::Cell;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

use tock_registers::fields::{Field, FieldValue};
use tock_registers::{register_bitfields, LocalRegisterCopy, RegisterLongName, UIntLike};

register_bitfields![u8,
    /// Control register
    pub SPCR [
        /// Receive interrupt enable
        SPRIE OFFSET(7) NUMBITS(1) [],
        /// Function enable
        SPE OFFSET(6) NUMBITS(1) [],
        /// Transmit interrupt enable
        SPTIE OFFSET(5) NUMBITS(1) [],
        /// Error interrupt enable
        SPEIE OFFSET(4) NUMBITS(1) [],
        /// Master mode select
        MSTR OFFSET(3) NUMBITS(1) [],
        /// Mode fault error detection enable
        MODFEN OFFSET(2) NUMBITS(1) [],
        /// Transmit-only mode, Legacy only. Word swap of read data on QSPI.
        TXMD OFFSET(1) NUMBITS(1) [],
        /// 3-wire mode, Legacy only. Byte swap of read data on QSPI.
        SPMS OFFSET(0) NUMBITS(1) []
    ],
    /// Slave select polarity register
    pub SSLP [
        SSL1P OFFSET(1) NUMBITS(1) [],
        SSL0P OFFSET(0) NUMBITS(1) []
    ],
    /// Pin control register
    pub SPPCR [
        /// MOSI idle value fixing enable
        MOIFE OFFSET(5) NUMBITS(1) [],
        /// MOSI idle fixed value
        MOIFV OFFSET(4) NUMBITS(1) [],
        /// Output mode. IO2/IO3 fixed value in single and dual mode on QSPI.
        SPOM OFFSET(2) NUMBITS(1) [],
        /// Loopback mode 2 (non-inverting)
        SPLP2 OFFSET(1) NUMBITS(1) [],
        /// Loopback mode
        SPLP OFFSET(0) NUMBITS(1) []
    ],
    /// Status register
    pub SPSR [
        /// Receive buffer full
        SPRF OFFSET(7) NUMBITS(1) [],
        /// Transmit end
        TEND OFFSET(6) NUMBITS(1) [],
        /// Transmit buffer empty
        SPTEF OFFSET(5) NUMBITS(1) [],
        /// Parity error
        PERF OFFSET(3) NUMBITS(1) [],
        /// Mode fault error
        MODF OFFSET(2) NUMBITS(1) [],
        /// Idle flag
        IDLNF OFFSET(1) NUMBITS(1) [],
        /// Overrun error, RSPI only
        OVRF OFFSET(0) NUMBITS(1) []
    ],
    /// Sequence control register
    pub SPSCR [
        /// Sequence length, in command slots minus one
        SPSLN OFFSET(0) NUMBITS(3) []
    ],
    /// Sequence status register
    pub SPSSR [
        SPECM OFFSET(4) NUMBITS(3) [],
        SPCP OFFSET(0) NUMBITS(3) []
    ],
    /// Data control register
    pub SPDCR [
        /// Dummy data transmission enable
        TXDMY OFFSET(7) NUMBITS(1) [],
        /// Access width. RZ uses both bits; on Legacy bit 5 alone selects
        /// 32-bit (set) or 16-bit (clear) access.
        SPLW OFFSET(5) NUMBITS(2) [
            Byte = 1,
            Word = 2,
            LongWord = 3
        ],
        /// Receive/transmit data select, Legacy only
        SPRDTD OFFSET(4) NUMBITS(1) [],
        /// SSL1 output select, Legacy only
        SLSEL OFFSET(2) NUMBITS(2) [],
        /// Frame count (one to four frames), Legacy only
        SPFC OFFSET(0) NUMBITS(2) []
    ],
    /// Clock delay register
    pub SPCKD [
        SCKDL OFFSET(0) NUMBITS(3) []
    ],
    /// Slave select negation delay register
    pub SSLND [
        SLNDL OFFSET(0) NUMBITS(3) []
    ],
    /// Next-access delay register
    pub SPND [
        SPNDL OFFSET(0) NUMBITS(3) []
    ],
    /// Control register 2, Legacy only
    pub SPCR2 [
        /// Parity self-test enable
        PTE OFFSET(3) NUMBITS(1) [],
        /// Idle interrupt enable
        SPIE OFFSET(2) NUMBITS(1) [],
        /// Odd parity (vs. even)
        SPOE OFFSET(1) NUMBITS(1) [],
        /// Parity enable
        SPPE OFFSET(0) NUMBITS(1) []
    ],
    /// Buffer control register, RZ and QSPI only
    pub SPBFCR [
        /// Transmit buffer data reset
        TXRST OFFSET(7) NUMBITS(1) [],
        /// Receive buffer data reset
        RXRST OFFSET(6) NUMBITS(1) [],
        /// Transmit buffer triggering number
        TXTRG OFFSET(4) NUMBITS(2) [],
        /// Receive buffer triggering number
        RXTRG OFFSET(0) NUMBITS(3) []
    ]
];

register_bitfields![u16,
    /// Command register, one per command slot
    pub SPCMD [
        /// Clock delay setting enable
        SCKDEN OFFSET(15) NUMBITS(1) [],
        /// SSL negation delay setting enable
        SLNDEN OFFSET(14) NUMBITS(1) [],
        /// Next-access delay enable
        SPNDEN OFFSET(13) NUMBITS(1) [],
        /// LSB first
        LSBF OFFSET(12) NUMBITS(1) [],
        /// Data length. Legacy and RZ encode `bits - 1` for 8 to 16 bits;
        /// QSPI uses 0 for 8, 1 for 16 and 2 for 32 bits.
        SPB OFFSET(8) NUMBITS(4) [],
        /// SSL signal level keeping
        SSLKP OFFSET(7) NUMBITS(1) [],
        /// SPI operating mode, QSPI only
        SPIMOD OFFSET(5) NUMBITS(2) [
            Single = 0,
            Dual = 1,
            Quad = 2
        ],
        /// Read (set) or write access in dual and quad mode, QSPI only
        SPRW OFFSET(4) NUMBITS(1) [],
        /// SSL assert signal setting, RSPI only (overlaps SPIMOD/SPRW)
        SSLA OFFSET(4) NUMBITS(2) [],
        /// Bit rate division setting
        BRDV OFFSET(2) NUMBITS(2) [],
        /// Clock polarity
        CPOL OFFSET(1) NUMBITS(1) [],
        /// Clock phase
        CPHA OFFSET(0) NUMBITS(1) []
    ]
];

/// Byte, halfword and word access to a memory-mapped register window.
///
/// Offsets are in bytes from the start of the controller's register block.
/// These are unconditional memory operations; implementations never fail.
pub trait RegisterWindow {
    fn read8(&self, offset: usize) -> u8;
    fn read16(&self, offset: usize) -> u16;
    fn read32(&self, offset: usize) -> u32;
    fn write8(&self, offset: usize, value: u8);
    fn write16(&self, offset: usize, value: u16);
    fn write32(&self, offset: usize, value: u32);
}

impl<T: RegisterWindow + ?Sized> RegisterWindow for &T {
    fn read8(&self, offset: usize) -> u8 {
        (**self).read8(offset)
    }

    fn read16(&self, offset: usize) -> u16 {
        (**self).read16(offset)
    }

    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write8(&self, offset: usize, value: u8) {
        (**self).write8(offset, value)
    }

    fn write16(&self, offset: usize, value: u16) {
        (**self).write16(offset, value)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// A register window backed by real memory-mapped I/O.
#[derive(Copy, Clone, Debug)]
pub struct MmioWindow {
    base: NonNull<u8>,
}

impl MmioWindow {
    /// Create a window over the register block starting at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be non-null and point at the start of an RSPI register
    /// block that stays mapped for as long as the window is used. Nothing
    /// else may assume exclusive ownership of that block.
    pub const unsafe fn new(base: *mut u8) -> MmioWindow {
        MmioWindow {
            // Safety: the caller promised `base` is non-null.
            base: unsafe { NonNull::new_unchecked(base) },
        }
    }

    fn at<T>(&self, offset: usize) -> *mut T {
        self.base.as_ptr().wrapping_add(offset).cast()
    }
}

impl RegisterWindow for MmioWindow {
    fn read8(&self, offset: usize) -> u8 {
        // Safety: `new` requires a live, mapped register block.
        unsafe { ptr::read_volatile(self.at(offset)) }
    }

    fn read16(&self, offset: usize) -> u16 {
        // Safety: `new` requires a live, mapped register block.
        unsafe { ptr::read_volatile(self.at(offset)) }
    }

    fn read32(&self, offset: usize) -> u32 {
        // Safety: `new` requires a live, mapped register block.
        unsafe { ptr::read_volatile(self.at(offset)) }
    }

    fn write8(&self, offset: usize, value: u8) {
        // Safety: `new` requires a live, mapped register block.
        unsafe { ptr::write_volatile(self.at(offset), value) }
    }

    fn write16(&self, offset: usize, value: u16) {
        // Safety: `new` requires a live, mapped register block.
        unsafe { ptr::write_volatile(self.at(offset), value) }
    }

    fn write32(&self, offset: usize, value: u32) {
        // Safety: `new` requires a live, mapped register block.
        unsafe { ptr::write_volatile(self.at(offset), value) }
    }
}

/// Integer widths a register can have.
pub trait RegisterWidth: UIntLike {
    fn read_from<W: RegisterWindow + ?Sized>(window: &W, offset: usize) -> Self;
    fn write_to<W: RegisterWindow + ?Sized>(window: &W, offset: usize, value: Self);
}

impl RegisterWidth for u8 {
    fn read_from<W: RegisterWindow + ?Sized>(window: &W, offset: usize) -> Self {
        window.read8(offset)
    }

    fn write_to<W: RegisterWindow + ?Sized>(window: &W, offset: usize, value: Self) {
        window.write8(offset, value)
    }
}

impl RegisterWidth for u16 {
    fn read_from<W: RegisterWindow + ?Sized>(window: &W, offset: usize) -> Self {
        window.read16(offset)
    }

    fn write_to<W: RegisterWindow + ?Sized>(window: &W, offset: usize, value: Self) {
        window.write16(offset, value)
    }
}

impl RegisterWidth for u32 {
    fn read_from<W: RegisterWindow + ?Sized>(window: &W, offset: usize) -> Self {
        window.read32(offset)
    }

    fn write_to<W: RegisterWindow + ?Sized>(window: &W, offset: usize, value: Self) {
        window.write32(offset, value)
    }
}

/// A register at a fixed offset, with width `T` and bitfields `R`.
pub struct Register<T: RegisterWidth, R: RegisterLongName = ()> {
    offset: usize,
    _reg: PhantomData<(T, R)>,
}

impl<T: RegisterWidth, R: RegisterLongName> Clone for Register<T, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: RegisterWidth, R: RegisterLongName> Copy for Register<T, R> {}

impl<T: RegisterWidth, R: RegisterLongName> Register<T, R> {
    pub const fn at(offset: usize) -> Self {
        Register {
            offset,
            _reg: PhantomData,
        }
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }
}

pub const CONTROL: Register<u8, SPCR::Register> = Register::at(0x00);
pub const SLAVE_SELECT_POLARITY: Register<u8, SSLP::Register> = Register::at(0x01);
pub const PIN_CONTROL: Register<u8, SPPCR::Register> = Register::at(0x02);
pub const STATUS: Register<u8, SPSR::Register> = Register::at(0x03);
pub(crate) const DATA_OFFSET: usize = 0x04;
pub const SEQUENCE_CONTROL: Register<u8, SPSCR::Register> = Register::at(0x08);
pub const SEQUENCE_STATUS: Register<u8, SPSSR::Register> = Register::at(0x09);
pub const BIT_RATE: Register<u8> = Register::at(0x0a);
pub const DATA_CONTROL: Register<u8, SPDCR::Register> = Register::at(0x0b);
pub const CLOCK_DELAY: Register<u8, SPCKD::Register> = Register::at(0x0c);
pub const NEGATION_DELAY: Register<u8, SSLND::Register> = Register::at(0x0d);
pub const NEXT_ACCESS_DELAY: Register<u8, SPND::Register> = Register::at(0x0e);
/// Legacy only.
pub const CONTROL2: Register<u8, SPCR2::Register> = Register::at(0x0f);
/// RZ only.
pub const RZ_BUFFER_CONTROL: Register<u8, SPBFCR::Register> = Register::at(0x20);
/// RZ only.
pub const RZ_BUFFER_DATA_COUNT: Register<u16> = Register::at(0x22);
/// QSPI only.
pub const QSPI_BUFFER_CONTROL: Register<u8, SPBFCR::Register> = Register::at(0x18);
/// QSPI only.
pub const QSPI_BUFFER_DATA_COUNT: Register<u16> = Register::at(0x1a);

/// Command register for slot `slot`.
pub const fn command(slot: usize) -> Register<u16, SPCMD::Register> {
    Register::at(0x10 + slot * 2)
}

/// Transfer data length multiplier for command slot `slot`. QSPI only.
pub const fn length_multiplier(slot: usize) -> Register<u32> {
    Register::at(0x1c + slot * 4)
}

/// How the data register is addressed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    HalfWord,
}

/// Typed view of the register window, plus the data register access width.
pub(crate) struct Registers<W: RegisterWindow> {
    window: W,
    access: Cell<AccessWidth>,
}

impl<W: RegisterWindow> Registers<W> {
    pub(crate) fn new(window: W) -> Self {
        Registers {
            window,
            access: Cell::new(AccessWidth::HalfWord),
        }
    }

    pub(crate) fn get<T: RegisterWidth, R: RegisterLongName>(
        &self,
        reg: Register<T, R>,
    ) -> LocalRegisterCopy<T, R> {
        LocalRegisterCopy::new(T::read_from(&self.window, reg.offset))
    }

    pub(crate) fn set<T: RegisterWidth, R: RegisterLongName>(&self, reg: Register<T, R>, value: T) {
        T::write_to(&self.window, reg.offset, value);
    }

    /// Write exactly `field`; bits outside it become zero.
    pub(crate) fn write<T: RegisterWidth, R: RegisterLongName>(
        &self,
        reg: Register<T, R>,
        field: FieldValue<T, R>,
    ) {
        self.set(reg, field.value);
    }

    /// Read-modify-write `field`, leaving other bits untouched.
    pub(crate) fn modify<T: RegisterWidth, R: RegisterLongName>(
        &self,
        reg: Register<T, R>,
        field: FieldValue<T, R>,
    ) {
        let mut current = self.get(reg);
        current.modify(field);
        self.set(reg, current.get());
    }

    pub(crate) fn is_set<T: RegisterWidth, R: RegisterLongName>(
        &self,
        reg: Register<T, R>,
        field: Field<T, R>,
    ) -> bool {
        self.get(reg).is_set(field)
    }

    pub(crate) fn access_width(&self) -> AccessWidth {
        self.access.get()
    }

    /// Program the data-control register and the matching data register
    /// access width in one step.
    pub(crate) fn set_data_control(
        &self,
        value: FieldValue<u8, SPDCR::Register>,
        width: AccessWidth,
    ) {
        self.write(DATA_CONTROL, value);
        self.access.set(width);
    }

    pub(crate) fn read_data(&self) -> u16 {
        match self.access.get() {
            AccessWidth::Byte => self.window.read8(DATA_OFFSET) as u16,
            AccessWidth::HalfWord => self.window.read16(DATA_OFFSET),
        }
    }

    pub(crate) fn write_data(&self, data: u16) {
        match self.access.get() {
            AccessWidth::Byte => self.window.write8(DATA_OFFSET, data as u8),
            AccessWidth::HalfWord => self.window.write16(DATA_OFFSET, data),
        }
    }
}
