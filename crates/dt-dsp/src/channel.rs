//! Stereo channel addressing.

/// One output channel (ear).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Left,
    Right,
}

impl Channel {
    pub const BOTH: [Channel; 2] = [Channel::Left, Channel::Right];
}

/// Target of a parameter write. `Both` is shorthand for a Left write
/// followed by a Right write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelSelect {
    Left,
    Right,
    Both,
}

impl ChannelSelect {
    /// The individual channels this selection writes to.
    pub fn channels(self) -> &'static [Channel] {
        match self {
            ChannelSelect::Left => &[Channel::Left],
            ChannelSelect::Right => &[Channel::Right],
            ChannelSelect::Both => &Channel::BOTH,
        }
    }
}

impl From<Channel> for ChannelSelect {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Left => ChannelSelect::Left,
            Channel::Right => ChannelSelect::Right,
        }
    }
}
