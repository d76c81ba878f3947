//! Mode table: every operating mode the AC020 module supports.
//!
//! Each [`Mode`] indexes one [`FrameSizeDescriptor`]. The table order is part of
//! the host-visible contract: enumeration indices and best-match tie breaking
//! both follow it.

use crate::traits::{FourCC, Result, SensorError};

/// Media-bus pixel encoding on the sensor output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelEncoding {
    /// YUYV 4:2:2, two 8-bit samples per pixel.
    Yuyv8_2x8,
    /// UYVY 4:2:2, two 8-bit samples per pixel.
    Uyvy8_2x8,
}

impl PixelEncoding {
    /// Linux `MEDIA_BUS_FMT_*` code.
    pub const fn media_bus_code(self) -> u32 {
        match self {
            Self::Yuyv8_2x8 => 0x2008,
            Self::Uyvy8_2x8 => 0x2006,
        }
    }

    /// Memory pixel format a capture node produces for this encoding.
    pub const fn fourcc(self) -> FourCC {
        match self {
            Self::Yuyv8_2x8 => FourCC::YUYV,
            Self::Uyvy8_2x8 => FourCC::UYVY,
        }
    }
}

impl From<PixelEncoding> for v4l::FourCC {
    fn from(encoding: PixelEncoding) -> Self {
        encoding.fourcc().into()
    }
}

/// Field layout of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLayout {
    /// Progressive frames.
    None,
    /// Interleaved fields.
    Interlaced,
}

impl From<FieldLayout> for v4l::format::FieldOrder {
    fn from(field: FieldLayout) -> Self {
        match field {
            FieldLayout::None => Self::Progressive,
            FieldLayout::Interlaced => Self::Interlaced,
        }
    }
}

/// Color space reported in negotiated formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    /// sRGB, the only color space the sensor reports.
    #[default]
    Srgb,
}

impl From<ColorSpace> for v4l::format::Colorspace {
    fn from(color_space: ColorSpace) -> Self {
        match color_space {
            ColorSpace::Srgb => Self::SRGB,
        }
    }
}

/// Rational number, used for frame rates and intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction {
    /// Numerator.
    pub numerator: u32,
    /// Denominator.
    pub denominator: u32,
}

impl Fraction {
    /// Create a new fraction.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Swap numerator and denominator (frame rate to frame interval).
    pub const fn reciprocal(self) -> Self {
        Self::new(self.denominator, self.numerator)
    }
}

impl std::fmt::Display for Fraction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Static description of one mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizeDescriptor {
    /// Width in pixels.
    pub width: u16,
    /// Height in lines.
    pub height: u16,
    /// Media-bus encoding.
    pub encoding: PixelEncoding,
    /// Field layout.
    pub field: FieldLayout,
    /// Nominal maximum frame rate.
    pub max_frame_rate: Fraction,
}

impl FrameSizeDescriptor {
    /// Manhattan distance between this size and a requested one.
    pub fn distance(&self, width: u32, height: u32) -> u32 {
        u32::from(self.width)
            .abs_diff(width)
            .saturating_add(u32::from(self.height).abs_diff(height))
    }
}

/// Result of a frame interval enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInterval {
    /// Width of the entry.
    pub width: u16,
    /// Height of the entry.
    pub height: u16,
    /// Encoding of the entry.
    pub encoding: PixelEncoding,
    /// Time between frames in seconds.
    pub interval: Fraction,
}

/// Format as negotiated with the host pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    /// Width in pixels.
    pub width: u32,
    /// Height in lines.
    pub height: u32,
    /// Media-bus encoding.
    pub encoding: PixelEncoding,
    /// Color space.
    pub color_space: ColorSpace,
    /// Field layout.
    pub field: FieldLayout,
}

impl NegotiatedFormat {
    /// A format request for `width`×`height` with the given encoding.
    pub const fn new(width: u32, height: u32, encoding: PixelEncoding) -> Self {
        Self {
            width,
            height,
            encoding,
            color_space: ColorSpace::Srgb,
            field: FieldLayout::None,
        }
    }
}

impl From<&FrameSizeDescriptor> for NegotiatedFormat {
    fn from(size: &FrameSizeDescriptor) -> Self {
        Self {
            width: u32::from(size.width),
            height: u32::from(size.height),
            encoding: size.encoding,
            color_space: ColorSpace::Srgb,
            field: size.field,
        }
    }
}

impl From<&NegotiatedFormat> for v4l::Format {
    fn from(format: &NegotiatedFormat) -> Self {
        let mut v4l_format = Self::new(format.width, format.height, format.encoding.into());
        v4l_format.field_order = format.field.into();
        v4l_format.colorspace = format.color_space.into();
        v4l_format
    }
}

/// Physical video bus family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    /// Parallel bus with discrete sync lines (DVP).
    Parallel,
    /// Embedded sync codes (BT.656 style, also used for BT.1120 here).
    Bt656,
}

bitflags::bitflags! {
    /// Sync and clock polarity flags of the video bus.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct BusFlags: u32 {
        /// Vertical sync is active high.
        const VSYNC_ACTIVE_HIGH = 1 << 2;
        /// Horizontal sync is active high.
        const HSYNC_ACTIVE_HIGH = 1 << 0;
        /// Data is sampled on the rising pixel clock edge.
        const PCLK_SAMPLE_RISING = 1 << 4;
    }
}

/// Video bus configuration for the host receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Bus family.
    pub kind: BusKind,
    /// Polarity flags.
    pub flags: BusFlags,
}

/// Analog video standard a mode emulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStandard {
    /// 625 lines.
    Pal,
    /// 525 lines.
    Ntsc,
    /// Reported for the BT.1120 mode.
    Atsc,
}

/// Selection rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Selection target queried by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    /// Current crop rectangle.
    Crop,
    /// Default crop rectangle.
    CropDefault,
    /// Crop bounds.
    CropBounds,
    /// Compose rectangle (unsupported).
    Compose,
}

/// Operating mode of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// 640×512 parallel.
    #[default]
    Wn640Dvp,
    /// 720×576 BT.656 interlaced (PAL).
    Wn640Bt656Pal,
    /// 720×486 BT.656 interlaced (NTSC).
    Wn640Bt656Ntsc,
    /// 1280×1280 BT.1120.
    Gl1280Bt1120,
    /// 1280×1024 parallel.
    Gl1280Dvp,
    /// 384×288 parallel.
    Wn384Dvp,
    /// 720×576 BT.656 progressive (PAL timing).
    Wn640Bt656PalProgressive,
}

const PARALLEL_FLAGS: BusFlags = BusFlags::VSYNC_ACTIVE_HIGH
    .union(BusFlags::HSYNC_ACTIVE_HIGH)
    .union(BusFlags::PCLK_SAMPLE_RISING);

const RATE_30: Fraction = Fraction::new(30, 1);

static FRAME_SIZES: [FrameSizeDescriptor; 7] = [
    FrameSizeDescriptor {
        width: 640,
        height: 512,
        encoding: PixelEncoding::Yuyv8_2x8,
        field: FieldLayout::None,
        max_frame_rate: RATE_30,
    },
    FrameSizeDescriptor {
        width: 720,
        height: 576,
        encoding: PixelEncoding::Uyvy8_2x8,
        field: FieldLayout::Interlaced,
        max_frame_rate: RATE_30,
    },
    FrameSizeDescriptor {
        width: 720,
        height: 486,
        encoding: PixelEncoding::Uyvy8_2x8,
        field: FieldLayout::Interlaced,
        max_frame_rate: RATE_30,
    },
    FrameSizeDescriptor {
        width: 1280,
        height: 1280,
        encoding: PixelEncoding::Uyvy8_2x8,
        field: FieldLayout::Interlaced,
        max_frame_rate: RATE_30,
    },
    FrameSizeDescriptor {
        width: 1280,
        height: 1024,
        encoding: PixelEncoding::Uyvy8_2x8,
        field: FieldLayout::None,
        max_frame_rate: RATE_30,
    },
    FrameSizeDescriptor {
        width: 384,
        height: 288,
        encoding: PixelEncoding::Yuyv8_2x8,
        field: FieldLayout::None,
        max_frame_rate: RATE_30,
    },
    FrameSizeDescriptor {
        width: 720,
        height: 576,
        encoding: PixelEncoding::Uyvy8_2x8,
        field: FieldLayout::None,
        max_frame_rate: RATE_30,
    },
];

impl Mode {
    /// All modes in table order.
    pub const ALL: [Self; 7] = [
        Self::Wn640Dvp,
        Self::Wn640Bt656Pal,
        Self::Wn640Bt656Ntsc,
        Self::Gl1280Bt1120,
        Self::Gl1280Dvp,
        Self::Wn384Dvp,
        Self::Wn640Bt656PalProgressive,
    ];

    /// Position in the mode table.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Mode for a numeric selector, as used by module parameters.
    pub fn from_index(index: u32) -> Result<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|position| Self::ALL.get(position).copied())
            .ok_or(SensorError::InvalidIndex(index))
    }

    /// Table entry for this mode.
    pub const fn frame_size(self) -> &'static FrameSizeDescriptor {
        match self {
            Self::Wn640Dvp => &FRAME_SIZES[0],
            Self::Wn640Bt656Pal => &FRAME_SIZES[1],
            Self::Wn640Bt656Ntsc => &FRAME_SIZES[2],
            Self::Gl1280Bt1120 => &FRAME_SIZES[3],
            Self::Gl1280Dvp => &FRAME_SIZES[4],
            Self::Wn384Dvp => &FRAME_SIZES[5],
            Self::Wn640Bt656PalProgressive => &FRAME_SIZES[6],
        }
    }

    /// Video bus description for this mode.
    pub const fn bus_config(self) -> BusConfig {
        match self {
            Self::Wn640Dvp | Self::Wn384Dvp | Self::Gl1280Dvp => BusConfig {
                kind: BusKind::Parallel,
                flags: PARALLEL_FLAGS,
            },
            Self::Wn640Bt656Pal
            | Self::Wn640Bt656Ntsc
            | Self::Wn640Bt656PalProgressive
            | Self::Gl1280Bt1120 => BusConfig {
                kind: BusKind::Bt656,
                flags: BusFlags::PCLK_SAMPLE_RISING,
            },
        }
    }

    /// Sync/field byte written into START frames, or `None` to keep the
    /// template value.
    pub const fn sync_byte(self) -> Option<u8> {
        match self {
            Self::Wn640Dvp | Self::Gl1280Dvp | Self::Wn384Dvp => Some(0x00),
            Self::Wn640Bt656Pal => Some(0x18),
            Self::Wn640Bt656Ntsc => Some(0x19),
            Self::Wn640Bt656PalProgressive => Some(0x28),
            Self::Gl1280Bt1120 => None,
        }
    }

    /// Whether the module streams without START/STOP commands in this mode.
    pub const fn is_stream_exempt(self) -> bool {
        matches!(self, Self::Gl1280Bt1120 | Self::Gl1280Dvp)
    }

    /// Analog standard reported to the host, if any.
    pub const fn video_standard(self) -> Option<VideoStandard> {
        match self {
            Self::Wn640Bt656Pal | Self::Wn640Bt656PalProgressive => Some(VideoStandard::Pal),
            Self::Wn640Bt656Ntsc => Some(VideoStandard::Ntsc),
            Self::Gl1280Bt1120 => Some(VideoStandard::Atsc),
            Self::Wn640Dvp | Self::Gl1280Dvp | Self::Wn384Dvp => None,
        }
    }

    /// Crop window of the active image area. Only BT.1120 crops.
    pub const fn crop_bounds(self) -> Option<Rect> {
        match self {
            Self::Gl1280Bt1120 => Some(Rect {
                left: 0,
                top: 128,
                width: 1280,
                height: 1024,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Wn640Dvp => "wn640_dvp",
            Self::Wn640Bt656Pal => "wn640_bt656_pal",
            Self::Wn640Bt656Ntsc => "wn640_bt656_ntsc",
            Self::Gl1280Bt1120 => "gl1280_bt1120",
            Self::Gl1280Dvp => "gl1280_dvp",
            Self::Wn384Dvp => "wn384_dvp",
            Self::Wn640Bt656PalProgressive => "wn640_bt656_pal_progressive",
        };
        write!(f, "{name}")
    }
}

/// Number of mode table entries.
pub const fn len() -> usize {
    FRAME_SIZES.len()
}

/// Bounds-checked table lookup.
pub fn frame_size(index: u32) -> Result<&'static FrameSizeDescriptor> {
    usize::try_from(index)
        .ok()
        .and_then(|position| FRAME_SIZES.get(position))
        .ok_or(SensorError::InvalidIndex(index))
}

/// Table entry closest to `width`×`height` by `|Δw| + |Δh|`.
///
/// Ties go to the earliest entry.
pub fn best_match(width: u32, height: u32) -> (Mode, &'static FrameSizeDescriptor) {
    let best = Mode::ALL
        .into_iter()
        .min_by_key(|mode| mode.frame_size().distance(width, height))
        .unwrap_or_default();
    (best, best.frame_size())
}
