// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

// This is the subset of the Mach thread and task API used by the collector. The bindings are
// declared by hand; the layouts they operate on live in the `arch` module.

#![allow(non_camel_case_types)]

pub type kern_return_t = libc::c_int;
pub type natural_t = libc::c_uint;
pub type mach_port_t = natural_t;
pub type mach_port_name_t = natural_t;
pub type mach_msg_type_number_t = natural_t;
pub type thread_act_t = mach_port_t;
pub type task_t = mach_port_t;
pub type thread_state_flavor_t = libc::c_int;
pub type thread_state_t = *mut natural_t;
pub type vm_address_t = libc::uintptr_t;
pub type vm_size_t = libc::uintptr_t;

pub const KERN_SUCCESS: kern_return_t = 0;
pub const MACH_PORT_NULL: mach_port_t = 0;

extern "C" {
    static mach_task_self_: mach_port_t;

    pub fn thread_get_state(
        target_act: thread_act_t,
        flavor: thread_state_flavor_t,
        old_state: thread_state_t,
        old_state_count: *mut mach_msg_type_number_t,
    ) -> kern_return_t;
    pub fn thread_suspend(target_act: thread_act_t) -> kern_return_t;
    pub fn thread_resume(target_act: thread_act_t) -> kern_return_t;
    pub fn task_threads(
        target_task: task_t,
        act_list: *mut *mut thread_act_t,
        act_list_cnt: *mut mach_msg_type_number_t,
    ) -> kern_return_t;
    pub fn mach_thread_self() -> thread_act_t;
    pub fn mach_port_deallocate(task: task_t, name: mach_port_name_t) -> kern_return_t;
    pub fn vm_deallocate(
        target_task: task_t,
        address: vm_address_t,
        size: vm_size_t,
    ) -> kern_return_t;
    pub fn pthread_mach_thread_np(thread: libc::pthread_t) -> mach_port_t;
    pub fn pthread_from_mach_thread_np(port: mach_port_t) -> libc::pthread_t;
    pub fn pthread_main_np() -> libc::c_int;
}

/// The task port of the current process.
#[inline]
pub fn mach_task_self() -> task_t {
    // SAFETY: `mach_task_self_` is initialized by libSystem before any Rust code runs and is
    // never written afterwards.
    unsafe { mach_task_self_ }
}
