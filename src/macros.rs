#[cfg(feature = "log")]
macro_rules! lzma_info {
    ($($arg:tt)+) => {
        log::info!($($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! lzma_info {
    ($($arg:tt)+) => {};
}

#[cfg(feature = "log")]
macro_rules! lzma_debug {
    ($($arg:tt)+) => {
        log::debug!($($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! lzma_debug {
    ($($arg:tt)+) => {};
}

#[cfg(feature = "log")]
macro_rules! lzma_trace {
    ($($arg:tt)+) => {
        log::trace!($($arg)+)
    };
}

#[cfg(not(feature = "log"))]
macro_rules! lzma_trace {
    ($($arg:tt)+) => {};
}
