use std::io;

/// Turn the `-1` sentinel of a libc call into the `errno` it set.
pub fn cerr<Int: Copy + TryInto<libc::c_long>>(res: Int) -> io::Result<Int> {
    match res.try_into() {
        Ok(-1) => Err(io::Error::last_os_error()),
        _ => Ok(res),
    }
}

/// Like [`cerr`] but for the pthread family, which returns the error number instead of setting
/// `errno`.
pub fn cerr_errno(res: libc::c_int) -> io::Result<()> {
    match res {
        0 => Ok(()),
        errno => Err(io::Error::from_raw_os_error(errno)),
    }
}
