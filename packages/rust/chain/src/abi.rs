//! Solidity bindings for every contract the pipeline reads or writes.

use alloy_sol_types::sol;

sol! {
    /// Token row returned by the T2CR tokens view contract.
    #[derive(Debug, PartialEq, Eq)]
    struct Token {
        bytes32 ID;
        string name;
        string ticker;
        address addr;
        string symbolMultihash;
        uint8 status;
        uint256 decimals;
    }

    interface ITokensView {
        function getTokensCursor(
            address _t2crAddress,
            uint256 _cursor,
            uint256 _count,
            bool[6] _filter
        ) external view returns (Token[] tokens, bool hasMore);
    }

    interface IBadge {
        function queryAddresses(
            address _cursor,
            uint256 _count,
            bool[8] _filter,
            bool _oldestFirst
        ) external view returns (address[] values, bool hasMore);
    }

    interface IERC20Metadata {
        function decimals() external view returns (uint256);
    }

    interface IERC165 {
        function supportsInterface(bytes4 interfaceId) external view returns (bool);
    }

    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    interface IContentHashResolver {
        function setContenthash(bytes32 node, bytes hash) external;
    }
}
