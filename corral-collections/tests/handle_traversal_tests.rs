use corral_collections::{SafeList, SafetyMode};

#[test]
fn test_forward_traversal_in_order() {
    let list = SafeList::new();
    for value in [10, 20, 30] {
        list.append(value);
    }

    let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    assert_eq!(handle.value(), Some(&10));
    assert!(handle.next());
    assert_eq!(handle.value(), Some(&20));
    assert!(handle.next());
    assert_eq!(handle.value(), Some(&30));
    assert!(!handle.next());
    assert!(handle.is_empty());
}

#[test]
fn test_backward_traversal() {
    let list = SafeList::new();
    for value in [10, 20, 30] {
        list.append(value);
    }

    let mut handle = list.get_with_lock(2, SafetyMode::ReadOnly);
    assert_eq!(handle.value(), Some(&30));
    assert!(handle.previous());
    assert_eq!(handle.value(), Some(&20));
    assert!(handle.previous());
    assert_eq!(handle.value(), Some(&10));
    assert!(!handle.previous());
    assert!(handle.is_empty());
}

#[test]
fn test_previous_from_front_is_empty() {
    let list = SafeList::new();
    list.append(10);

    let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    assert!(!handle.previous());
    assert!(handle.is_empty());
}

#[test]
fn test_traversal_after_end_stays_empty() {
    let list = SafeList::new();
    list.append(10);

    let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    assert!(!handle.next());
    assert!(!handle.next());
    assert!(handle.is_empty());
}

#[test]
fn test_traversal_keeps_write_mode() {
    let list = SafeList::new();
    for value in [1u32, 2, 3] {
        list.append(value);
    }

    let mut handle = list.get_with_lock(0, SafetyMode::ReadWrite);
    loop {
        *handle.value_mut().unwrap() += 100;
        assert_eq!(handle.mode(), SafetyMode::ReadWrite);
        if !handle.next() {
            break;
        }
    }

    let visited: Vec<u32> = list
        .iter_with_lock(SafetyMode::ReadOnly)
        .filter_map(|h| h.value().copied())
        .collect();
    assert_eq!(visited, vec![101, 102, 103]);
}

#[test]
fn test_step_over_entry_removed_behind_cursor() {
    let list = SafeList::new();
    for value in [10, 20, 30] {
        list.append(value);
    }

    // Remove the element the handle is sitting on; the successor shifts
    // into its slot and the next step must land there.
    let mut handle = list.get_with_lock(1, SafetyMode::ReadOnly);
    assert_eq!(handle.value(), Some(&20));
    assert_eq!(handle.set_mode(SafetyMode::Reference), Ok(()));
    assert!(list.remove(&20));

    assert!(handle.next());
    assert_eq!(handle.value(), None);
    assert_eq!(handle.mode(), SafetyMode::Reference);
    assert_eq!(handle.set_mode(SafetyMode::ReadOnly), Ok(()));
    assert_eq!(handle.value(), Some(&30));
}

#[test]
fn test_backward_step_over_removed_current() {
    let list = SafeList::new();
    for value in [10, 20, 30] {
        list.append(value);
    }

    let mut handle = list.get_with_lock(1, SafetyMode::Reference);
    assert!(list.remove(&20));

    assert!(handle.previous());
    assert_eq!(handle.set_mode(SafetyMode::ReadOnly), Ok(()));
    assert_eq!(handle.value(), Some(&10));
}

#[test]
fn test_empty_handle_traversal_is_inert() {
    let list = SafeList::<u32>::new();
    let mut handle = list.get_with_lock(0, SafetyMode::ReadOnly);
    assert!(handle.is_empty());
    assert!(!handle.next());
    assert!(!handle.previous());
}
