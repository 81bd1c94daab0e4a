//! Command opcodes and register snapshots for the Nowind protocol.
//!
//! Every request from the MSX carries the Z80 registers `BC`, `DE`, `HL`,
//! `F` and `A` at the moment of the call, followed by an opcode byte.

use std::fmt;

/// Command opcodes sent by the Nowind interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandOpcode {
    // Disk driver entry points
    /// Read or write sectors.
    DskIo = 0x80,
    /// Disk change status.
    DskChg = 0x81,
    /// Get drive parameter block.
    GetDpb = 0x82,
    /// Format choice string.
    Choice = 0x83,
    /// Format a disk.
    DskFmt = 0x84,
    /// Number of drives.
    Drives = 0x85,
    /// Initialize environment.
    IniEnv = 0x86,
    /// Get host date.
    GetDate = 0x87,

    // Host device access
    /// Open a host device.
    DeviceOpen = 0x88,
    /// Close a host device.
    DeviceClose = 0x89,
    /// Random access device I/O.
    DeviceRndIo = 0x8A,
    /// Write to a host device.
    DeviceWrite = 0x8B,
    /// Read from a host device.
    DeviceRead = 0x8C,
    /// End-of-file check.
    DeviceEof = 0x8D,
    /// Auxiliary input.
    AuxIn = 0x8E,
    /// Auxiliary output.
    AuxOut = 0x8F,

    // Miscellaneous
    /// Message from the MSX.
    Message = 0x90,
    /// Change the mounted image.
    ChangeImage = 0x91,
    /// DOS version query.
    GetDosVersion = 0x92,
    /// Poll for a host-side command.
    CmdRequest = 0x93,
    /// Read a memory block.
    BlockRead = 0x94,
    /// Write a memory block.
    BlockWrite = 0x95,
    /// CPU information.
    CpuInfo = 0x96,
    /// Generic command.
    Command = 0x97,
    /// Standard output.
    StdOut = 0x98,
}

impl CommandOpcode {
    /// Attempts to parse an opcode from a byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x80 => Some(Self::DskIo),
            0x81 => Some(Self::DskChg),
            0x82 => Some(Self::GetDpb),
            0x83 => Some(Self::Choice),
            0x84 => Some(Self::DskFmt),
            0x85 => Some(Self::Drives),
            0x86 => Some(Self::IniEnv),
            0x87 => Some(Self::GetDate),
            0x88 => Some(Self::DeviceOpen),
            0x89 => Some(Self::DeviceClose),
            0x8A => Some(Self::DeviceRndIo),
            0x8B => Some(Self::DeviceWrite),
            0x8C => Some(Self::DeviceRead),
            0x8D => Some(Self::DeviceEof),
            0x8E => Some(Self::AuxIn),
            0x8F => Some(Self::AuxOut),
            0x90 => Some(Self::Message),
            0x91 => Some(Self::ChangeImage),
            0x92 => Some(Self::GetDosVersion),
            0x93 => Some(Self::CmdRequest),
            0x94 => Some(Self::BlockRead),
            0x95 => Some(Self::BlockWrite),
            0x96 => Some(Self::CpuInfo),
            0x97 => Some(Self::Command),
            0x98 => Some(Self::StdOut),
            _ => None,
        }
    }

    /// Protocol name of the opcode, as used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DskIo => "DSKIO",
            Self::DskChg => "DSKCHG",
            Self::GetDpb => "GETDPB",
            Self::Choice => "CHOICE",
            Self::DskFmt => "DSKFMT",
            Self::Drives => "DRIVES",
            Self::IniEnv => "INIENV",
            Self::GetDate => "GETDATE",
            Self::DeviceOpen => "DEVICEOPEN",
            Self::DeviceClose => "DEVICECLOSE",
            Self::DeviceRndIo => "DEVICERNDIO",
            Self::DeviceWrite => "DEVICEWRITE",
            Self::DeviceRead => "DEVICEREAD",
            Self::DeviceEof => "DEVICEEOF",
            Self::AuxIn => "AUXIN",
            Self::AuxOut => "AUXOUT",
            Self::Message => "MESSAGE",
            Self::ChangeImage => "CHANGEIMAGE",
            Self::GetDosVersion => "GETDOSVERSION",
            Self::CmdRequest => "CMDREQUEST",
            Self::BlockRead => "BLOCKREAD",
            Self::BlockWrite => "BLOCKWRITE",
            Self::CpuInfo => "CPUINFO",
            Self::Command => "COMMAND",
            Self::StdOut => "STDOUT",
        }
    }
}

impl From<CommandOpcode> for u8 {
    fn from(cmd: CommandOpcode) -> Self {
        cmd as Self
    }
}

/// High byte of a register pair.
#[must_use]
pub const fn high(value: u16) -> u8 {
    (value >> 8) as u8
}

/// Low byte of a register pair.
#[must_use]
pub const fn low(value: u16) -> u8 {
    (value & 0xFF) as u8
}

/// A decoded request: the register snapshot and the raw opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// `BC` register pair.
    pub bc: u16,
    /// `DE` register pair.
    pub de: u16,
    /// `HL` register pair.
    pub hl: u16,
    /// Flags register.
    pub f: u8,
    /// Accumulator.
    pub a: u8,
    /// Opcode byte, possibly unknown.
    pub cmd: u8,
}

impl Command {
    /// Builds a command from its register values.
    #[must_use]
    pub const fn decode(bc: u16, de: u16, hl: u16, f: u8, a: u8, cmd: u8) -> Self {
        Self {
            bc,
            de,
            hl,
            f,
            a,
            cmd,
        }
    }

    /// Looks up the opcode; `None` for bytes outside the command table.
    #[must_use]
    pub const fn opcode(&self) -> Option<CommandOpcode> {
        CommandOpcode::from_byte(self.cmd)
    }

    #[must_use]
    pub const fn b(&self) -> u8 {
        high(self.bc)
    }

    #[must_use]
    pub const fn c(&self) -> u8 {
        low(self.bc)
    }

    #[must_use]
    pub const fn d(&self) -> u8 {
        high(self.de)
    }

    #[must_use]
    pub const fn e(&self) -> u8 {
        low(self.de)
    }

    #[must_use]
    pub const fn h(&self) -> u8 {
        high(self.hl)
    }

    #[must_use]
    pub const fn l(&self) -> u8 {
        low(self.hl)
    }

    /// Carry flag; set by the disk driver when `DSKIO` means write.
    #[must_use]
    pub const fn carry(&self) -> bool {
        self.f & 0x01 != 0
    }

    /// Number of sectors requested by `DSKIO`.
    #[must_use]
    pub const fn sector_amount(&self) -> u8 {
        self.b()
    }

    /// First sector of a `DSKIO` request.
    ///
    /// `DE` holds the low 16 bits. When `C` is below `0x80` it carries
    /// bits 16..22, giving access to images larger than 32 MB.
    #[must_use]
    pub fn start_sector(&self) -> u32 {
        let c = self.c();
        if c < 0x80 {
            (u32::from(c) << 16) | u32::from(self.de)
        } else {
            u32::from(self.de)
        }
    }

    /// MSX memory address a `DSKIO` read is transferred to.
    #[must_use]
    pub const fn transfer_address(&self) -> u16 {
        self.hl
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().map_or("unknown", CommandOpcode::name);
        write!(
            f,
            "{name} ({:02X}) BC={:04X}, DE={:04X}, HL={:04X}, F={:02X}, A={:02X}",
            self.cmd, self.bc, self.de, self.hl, self.f, self.a
        )
    }
}
