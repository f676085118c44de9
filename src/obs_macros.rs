// Event macros that compile to nothing when the `tracing` feature is off.

macro_rules! obs_debug {
	($($arg:tt)*) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::debug!($($arg)*);
		}
	}};
}

macro_rules! obs_info {
	($($arg:tt)*) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::info!($($arg)*);
		}
	}};
}

macro_rules! obs_warn {
	($($arg:tt)*) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::warn!($($arg)*);
		}
	}};
}
