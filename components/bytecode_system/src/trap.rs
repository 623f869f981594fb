//! Trap identifiers.
//!
//! A `TRAP` instruction pops one of these ids and hands control to the
//! runtime's native bridge. The numbering starts at -4000 and is shared with
//! the compiler, so it must stay bit-exact.

stable_enum! {
    /// Native operations reachable through `TRAP` and `TRAP_RTRN`.
    pub enum TrapId: -4000 {
        LoadClsInstId => "LOAD_CLS_INST_ID",
        LoadClsByInst => "LOAD_CLS_BY_INST",
        LoadClsByName => "LOAD_CLS_BY_NAME",
        LoadNewObjInst => "LOAD_NEW_OBJ_INST",
        LoadInstUid => "LOAD_INST_UID",
        LoadMultiArySize => "LOAD_MULTI_ARY_SIZE",
        CpyCharStrAry => "CPY_CHAR_STR_ARY",
        CpyCharStrArys => "CPY_CHAR_STR_ARYS",
        CpyIntStrAry => "CPY_INT_STR_ARY",
        CpyByteStrAry => "CPY_BYTE_STR_ARY",
        CpyBoolStrAry => "CPY_BOOL_STR_ARY",
        CpyFloatStrAry => "CPY_FLOAT_STR_ARY",
        BytesToUnicode => "BYTES_TO_UNICODE",
        UnicodeToBytes => "UNICODE_TO_BYTES",
        StringHashId => "STRING_HASH_ID",
        SysTime => "SYS_TIME",
        GmtTime => "GMT_TIME",
        FileCreateTime => "FILE_CREATE_TIME",
        FileModifiedTime => "FILE_MODIFIED_TIME",
        FileAccessedTime => "FILE_ACCESSED_TIME",
        FileLoggerDir => "FILE_LOGGER_DIR",
        FileAccountOwner => "FILE_ACCOUNT_OWNER",
        FileGroupOwner => "FILE_GROUP_OWNER",
        DateTimeSet1 => "DATE_TIME_SET_1",
        DateTimeSet2 => "DATE_TIME_SET_2",
        DateTimeAddDays => "DATE_TIME_ADD_DAYS",
        DateTimeAddHours => "DATE_TIME_ADD_HOURS",
        DateTimeAddMins => "DATE_TIME_ADD_MINS",
        DateTimeAddSecs => "DATE_TIME_ADD_SECS",
        DateToUnixTime => "DATE_TO_UNIX_TIME",
        DateFromUnixGmtTime => "DATE_FROM_UNIX_GMT_TIME",
        DateFromUnixLocalTime => "DATE_FROM_UNIX_LOCAL_TIME",
        TimerStart => "TIMER_START",
        TimerEnd => "TIMER_END",
        TimerElapsed => "TIMER_ELAPSED",
        StdInString => "STD_IN_STRING",
        StdOutBool => "STD_OUT_BOOL",
        StdOutByte => "STD_OUT_BYTE",
        StdOutChar => "STD_OUT_CHAR",
        StdOutInt => "STD_OUT_INT",
        StdOutFloat => "STD_OUT_FLOAT",
        StdIntFmt => "STD_INT_FMT",
        StdFloatFmt => "STD_FLOAT_FMT",
        StdFloatPer => "STD_FLOAT_PER",
        StdWidth => "STD_WIDTH",
        StdFill => "STD_FILL",
        StdOutString => "STD_OUT_STRING",
        StdOutByteAryLen => "STD_OUT_BYTE_ARY_LEN",
        StdOutCharAryLen => "STD_OUT_CHAR_ARY_LEN",
        StdInByteAryLen => "STD_IN_BYTE_ARY_LEN",
        StdInCharAryLen => "STD_IN_CHAR_ARY_LEN",
        StdFlush => "STD_FLUSH",
        StdErrBool => "STD_ERR_BOOL",
        StdErrByte => "STD_ERR_BYTE",
        StdErrChar => "STD_ERR_CHAR",
        StdErrInt => "STD_ERR_INT",
        StdErrFloat => "STD_ERR_FLOAT",
        StdErrString => "STD_ERR_STRING",
        StdErrCharAry => "STD_ERR_CHAR_ARY",
        StdErrByteAry => "STD_ERR_BYTE_ARY",
        StdErrFlush => "STD_ERR_FLUSH",
        CompressZlibBytes => "COMPRESS_ZLIB_BYTES",
        UncompressZlibBytes => "UNCOMPRESS_ZLIB_BYTES",
        CompressGzipBytes => "COMPRESS_GZIP_BYTES",
        UncompressGzipBytes => "UNCOMPRESS_GZIP_BYTES",
        CompressBrBytes => "COMPRESS_BR_BYTES",
        UncompressBrBytes => "UNCOMPRESS_BR_BYTES",
        Crc32Bytes => "CRC32_BYTES",
        FileOpenRead => "FILE_OPEN_READ",
        FileOpenAppend => "FILE_OPEN_APPEND",
        FileOpenWrite => "FILE_OPEN_WRITE",
        FileOpenReadWrite => "FILE_OPEN_READ_WRITE",
        FileClose => "FILE_CLOSE",
        FileFlush => "FILE_FLUSH",
        FileInByte => "FILE_IN_BYTE",
        FileOutByte => "FILE_OUT_BYTE",
        FileInByteAry => "FILE_IN_BYTE_ARY",
        FileInCharAry => "FILE_IN_CHAR_ARY",
        FileOutByteAry => "FILE_OUT_BYTE_ARY",
        FileOutCharAry => "FILE_OUT_CHAR_ARY",
        FileInString => "FILE_IN_STRING",
        FileOutString => "FILE_OUT_STRING",
        FileIsOpen => "FILE_IS_OPEN",
        FileExists => "FILE_EXISTS",
        FileCanWriteOnly => "FILE_CAN_WRITE_ONLY",
        FileCanReadOnly => "FILE_CAN_READ_ONLY",
        FileCanReadWrite => "FILE_CAN_READ_WRITE",
        FileSize => "FILE_SIZE",
        FileFullPath => "FILE_FULL_PATH",
        FileTempName => "FILE_TEMP_NAME",
        FileRewind => "FILE_REWIND",
        FileSeek => "FILE_SEEK",
        FileEof => "FILE_EOF",
        FileDelete => "FILE_DELETE",
        FileRename => "FILE_RENAME",
        FileCopy => "FILE_COPY",
        PipeOpen => "PIPE_OPEN",
        PipeCreate => "PIPE_CREATE",
        PipeInByte => "PIPE_IN_BYTE",
        PipeOutByte => "PIPE_OUT_BYTE",
        PipeInByteAry => "PIPE_IN_BYTE_ARY",
        PipeInCharAry => "PIPE_IN_CHAR_ARY",
        PipeOutByteAry => "PIPE_OUT_BYTE_ARY",
        PipeOutCharAry => "PIPE_OUT_CHAR_ARY",
        PipeInString => "PIPE_IN_STRING",
        PipeOutString => "PIPE_OUT_STRING",
        PipeClose => "PIPE_CLOSE",
        DirCreate => "DIR_CREATE",
        DirSlash => "DIR_SLASH",
        DirExists => "DIR_EXISTS",
        DirList => "DIR_LIST",
        DirCopy => "DIR_COPY",
        DirGetCur => "DIR_GET_CUR",
        DirSetCur => "DIR_SET_CUR",
        DirDelete => "DIR_DELETE",
        SymLinkCreate => "SYM_LINK_CREATE",
        SymLinkCopy => "SYM_LINK_COPY",
        SymLinkLoc => "SYM_LINK_LOC",
        SymLinkExists => "SYM_LINK_EXISTS",
        HardLinkCreate => "HARD_LINK_CREATE",
        SockTcpConnect => "SOCK_TCP_CONNECT",
        SockTcpBind => "SOCK_TCP_BIND",
        SockTcpListen => "SOCK_TCP_LISTEN",
        SockTcpAccept => "SOCK_TCP_ACCEPT",
        SockTcpSelect => "SOCK_TCP_SELECT",
        SockTcpIsConnected => "SOCK_TCP_IS_CONNECTED",
        SockTcpClose => "SOCK_TCP_CLOSE",
        SockTcpInByte => "SOCK_TCP_IN_BYTE",
        SockTcpInByteAry => "SOCK_TCP_IN_BYTE_ARY",
        SockTcpInCharAry => "SOCK_TCP_IN_CHAR_ARY",
        SockTcpOutByte => "SOCK_TCP_OUT_BYTE",
        SockTcpOutByteAry => "SOCK_TCP_OUT_BYTE_ARY",
        SockTcpOutCharAry => "SOCK_TCP_OUT_CHAR_ARY",
        SockTcpInString => "SOCK_TCP_IN_STRING",
        SockTcpOutString => "SOCK_TCP_OUT_STRING",
        SockTcpHostName => "SOCK_TCP_HOST_NAME",
        SockTcpResolveName => "SOCK_TCP_RESOLVE_NAME",
        SockIpError => "SOCK_IP_ERROR",
        SockUdpCreate => "SOCK_UDP_CREATE",
        SockUdpBind => "SOCK_UDP_BIND",
        SockUdpClose => "SOCK_UDP_CLOSE",
        SockUdpInByte => "SOCK_UDP_IN_BYTE",
        SockUdpInByteAry => "SOCK_UDP_IN_BYTE_ARY",
        SockUdpInCharAry => "SOCK_UDP_IN_CHAR_ARY",
        SockUdpOutByte => "SOCK_UDP_OUT_BYTE",
        SockUdpOutByteAry => "SOCK_UDP_OUT_BYTE_ARY",
        SockUdpOutCharAry => "SOCK_UDP_OUT_CHAR_ARY",
        SockUdpInString => "SOCK_UDP_IN_STRING",
        SockUdpOutString => "SOCK_UDP_OUT_STRING",
        SockTcpSslConnect => "SOCK_TCP_SSL_CONNECT",
        SockTcpSslClose => "SOCK_TCP_SSL_CLOSE",
        SockTcpSslIssuer => "SOCK_TCP_SSL_ISSUER",
        SockTcpSslSubject => "SOCK_TCP_SSL_SUBJECT",
        SockTcpSslInByte => "SOCK_TCP_SSL_IN_BYTE",
        SockTcpSslInByteAry => "SOCK_TCP_SSL_IN_BYTE_ARY",
        SockTcpSslInCharAry => "SOCK_TCP_SSL_IN_CHAR_ARY",
        SockTcpSslOutByte => "SOCK_TCP_SSL_OUT_BYTE",
        SockTcpSslOutByteAry => "SOCK_TCP_SSL_OUT_BYTE_ARY",
        SockTcpSslOutCharAry => "SOCK_TCP_SSL_OUT_CHAR_ARY",
        SockTcpSslInString => "SOCK_TCP_SSL_IN_STRING",
        SockTcpSslOutString => "SOCK_TCP_SSL_OUT_STRING",
        SockTcpSslListen => "SOCK_TCP_SSL_LISTEN",
        SockTcpSslAccept => "SOCK_TCP_SSL_ACCEPT",
        SockTcpSslSelect => "SOCK_TCP_SSL_SELECT",
        SockTcpSslSrvCert => "SOCK_TCP_SSL_SRV_CERT",
        SockTcpSslError => "SOCK_TCP_SSL_ERROR",
        SockTcpSslSrvClose => "SOCK_TCP_SSL_SRV_CLOSE",
        SerlInt => "SERL_INT",
        SerlFloat => "SERL_FLOAT",
        SerlObjInst => "SERL_OBJ_INST",
        SerlByteAry => "SERL_BYTE_ARY",
        SerlIntAry => "SERL_INT_ARY",
        SerlObjAry => "SERL_OBJ_ARY",
        SerlFloatAry => "SERL_FLOAT_ARY",
        SerlChar => "SERL_CHAR",
        SerlCharAry => "SERL_CHAR_ARY",
        DeserlInt => "DESERL_INT",
        DeserlFloat => "DESERL_FLOAT",
        DeserlObjInst => "DESERL_OBJ_INST",
        DeserlByteAry => "DESERL_BYTE_ARY",
        DeserlIntAry => "DESERL_INT_ARY",
        DeserlObjAry => "DESERL_OBJ_ARY",
        DeserlFloatAry => "DESERL_FLOAT_ARY",
        DeserlChar => "DESERL_CHAR",
        DeserlCharAry => "DESERL_CHAR_ARY",
        GetPltfrm => "GET_PLTFRM",
        GetVersion => "GET_VERSION",
        GetSysProp => "GET_SYS_PROP",
        SetSysProp => "SET_SYS_PROP",
        GetSysEnv => "GET_SYS_ENV",
        SetSysEnv => "SET_SYS_ENV",
        SysCmd => "SYS_CMD",
        SysCmdOut => "SYS_CMD_OUT",
        AssertTrue => "ASSERT_TRUE",
        Exit => "EXIT",
    }
}
